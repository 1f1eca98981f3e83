//! Link fixer: repairs dead anchors in a materialized tree
//!
//! Works on any directory of HTML files. Every `<a href>` is classified; only
//! `javascript:` pseudo-links and local links whose target is missing are
//! replaced, either by a fixed URL or by a relative link to a local fallback page.
//! Modified files get a `.backup` sibling holding their original bytes, and
//! [`restore`] puts those back.
//!
//! # Example
//!
//! ```no_run
//! use sumi_mirror::linkfix::{LinkFixer, ReplacementPolicy};
//!
//! let fixer = LinkFixer::new("./mirror", ReplacementPolicy::LocalFallback("index.html".into()))?
//!     .dry_run(true);
//! let report = fixer.run()?;
//! println!("{} links would be fixed", report.links_fixed);
//! # Ok::<(), sumi_mirror::MirrorError>(())
//! ```

mod backup;
mod classify;
mod report;

pub use backup::{create_backup, restore, BackupRecord, BACKUP_SUFFIX};
pub use classify::{classify_href, LinkClass};
pub use report::{
    format_fix_report, format_restore_report, print_fix_report, print_restore_report, FixEntry,
    FixReport, RestoreReport,
};

use crate::document::{Edit, HtmlDocument};
use crate::output::OutputTree;
use crate::rewrite::relative_path;
use crate::{ConfigError, MirrorError};
use std::fs;
use std::path::{Path, PathBuf};

/// What a dead anchor is replaced with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// The same absolute URL everywhere
    ExternalUrl(String),
    /// A file under the scanned root, given root-relative; each page links it relatively
    LocalFallback(String),
}

pub struct LinkFixer {
    output: OutputTree,
    root: PathBuf,
    policy: ReplacementPolicy,
    backups: bool,
    dry_run: bool,
}

impl LinkFixer {
    /// Prepares a fixer for `root` with backups on
    ///
    /// Fails if `root` is not a directory or the local fallback does not exist.
    pub fn new(root: impl Into<PathBuf>, policy: ReplacementPolicy) -> Result<Self, MirrorError> {
        let root = root.into();
        let root = fs::canonicalize(&root).map_err(|source| MirrorError::Filesystem {
            path: root.clone(),
            source,
        })?;
        let output = OutputTree::open(&root)?;

        let policy = match policy {
            ReplacementPolicy::LocalFallback(path) => {
                let path = path.trim_start_matches('/').replace('\\', "/");
                if !output.exists(&path) {
                    return Err(ConfigError::Validation(format!(
                        "local fallback {} does not exist under {}",
                        path,
                        root.display()
                    ))
                    .into());
                }
                ReplacementPolicy::LocalFallback(path)
            }
            ReplacementPolicy::ExternalUrl(url) => {
                if url.trim().is_empty() {
                    return Err(
                        ConfigError::Validation("replacement URL cannot be empty".to_string()).into(),
                    );
                }
                ReplacementPolicy::ExternalUrl(url)
            }
        };

        Ok(Self {
            output,
            root,
            policy,
            backups: true,
            dry_run: false,
        })
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups = enabled;
        self
    }

    /// Report what would change without writing anything
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Scans every `.html`/`.htm` file under the root in path order
    ///
    /// A file that cannot be read or written is recorded in the report and skipped.
    pub fn run(&self) -> Result<FixReport, MirrorError> {
        let mut report = FixReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        for relative in walk_files(&self.root)?.into_iter().filter(|p| is_html(p)) {
            report.files_scanned += 1;
            if let Err(e) = self.fix_file(&relative, &mut report) {
                tracing::warn!("Skipping {}: {}", relative, e);
                report.errors.push((relative, e.to_string()));
            }
        }

        tracing::info!(
            "Link fixer scanned {} files, fixed {} links in {} files",
            report.files_scanned,
            report.links_fixed,
            report.files_modified
        );
        Ok(report)
    }

    fn fix_file(&self, relative: &str, report: &mut FixReport) -> Result<(), MirrorError> {
        let original = self.output.read(relative)?;
        let doc = HtmlDocument::parse(original.as_slice())?;
        let file = self.output.path_of(relative);

        let mut edits = Vec::new();
        let mut entries = Vec::new();

        for (index, tag) in doc.tags().iter().enumerate() {
            if tag.name != "a" {
                continue;
            }
            let Some(attr) = tag.attr_index("href") else {
                continue;
            };
            let href = tag.attrs[attr].value.as_str();

            let class = classify_href(href, &file, &self.root);
            if !class.needs_fix() {
                *report.preserved.entry(class).or_default() += 1;
                continue;
            }

            let replacement = self.replacement_for(relative);
            tracing::debug!("{}: {} ({}) -> {}", relative, href, class, replacement);
            edits.push(Edit::SetAttribute {
                tag: index,
                attr,
                value: replacement.clone(),
            });
            entries.push(FixEntry {
                file: relative.to_string(),
                original: href.to_string(),
                replacement,
                class,
            });
        }

        if edits.is_empty() {
            return Ok(());
        }

        if !self.dry_run {
            let updated = doc.apply(edits)?;
            if self.backups {
                if let Some(record) = create_backup(&self.output, relative, &original)? {
                    report.backups.push(record);
                }
            }
            self.output.write(relative, &updated)?;
        }

        report.files_modified += 1;
        report.links_fixed += entries.len();
        report.entries.extend(entries);
        Ok(())
    }

    fn replacement_for(&self, relative: &str) -> String {
        match &self.policy {
            ReplacementPolicy::ExternalUrl(url) => url.clone(),
            ReplacementPolicy::LocalFallback(fallback) => relative_path(relative, fallback),
        }
    }
}

fn is_html(relative: &str) -> bool {
    let lower = relative.to_ascii_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}

/// Every regular file under `root` as a sorted `/`-separated relative path
///
/// Symlinked directories are not followed.
pub(crate) fn walk_files(root: &Path) -> Result<Vec<String>, MirrorError> {
    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| MirrorError::Filesystem {
            path: dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| MirrorError::Filesystem {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = format!("{}{}", prefix, name);

            match entry.file_type() {
                Ok(kind) if kind.is_dir() => {
                    pending.push((entry.path(), format!("{}/", relative)));
                }
                Ok(kind) if kind.is_file() => files.push(relative),
                _ => {}
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        let output = OutputTree::open(dir.path()).unwrap();
        output.write("index.html", br##"<a href="#top">Top</a>"##).unwrap();
        output
            .write(
                "games/slots/index.html",
                br#"<p><a href="/desktop/slots/pragmatic">Play</a> <a href='../../index.html'>Home</a></p>"#,
            )
            .unwrap();
        output.write("notes.txt", b"<a href=\"nowhere\">").unwrap();
        dir
    }

    #[test]
    fn test_local_fallback_is_relative_per_depth() {
        let dir = site();
        let fixer = LinkFixer::new(
            dir.path(),
            ReplacementPolicy::LocalFallback("index.html".to_string()),
        )
        .unwrap();

        let report = fixer.run().unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.links_fixed, 1);
        assert_eq!(report.entries[0].replacement, "../../index.html");
        let page = fs::read_to_string(dir.path().join("games/slots/index.html")).unwrap();
        assert_eq!(
            page,
            r#"<p><a href="../../index.html">Play</a> <a href='../../index.html'>Home</a></p>"#
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = site();
        let before = fs::read(dir.path().join("games/slots/index.html")).unwrap();

        let report = LinkFixer::new(
            dir.path(),
            ReplacementPolicy::ExternalUrl("https://example.com/".to_string()),
        )
        .unwrap()
        .dry_run(true)
        .run()
        .unwrap();

        assert_eq!(report.links_fixed, 1);
        assert!(report.backups.is_empty());
        assert_eq!(fs::read(dir.path().join("games/slots/index.html")).unwrap(), before);
        assert!(!dir.path().join("games/slots/index.html.backup").exists());
    }

    #[test]
    fn test_unchanged_files_get_no_backup() {
        let dir = site();
        LinkFixer::new(
            dir.path(),
            ReplacementPolicy::ExternalUrl("https://example.com/".to_string()),
        )
        .unwrap()
        .run()
        .unwrap();

        assert!(dir.path().join("games/slots/index.html.backup").exists());
        assert!(!dir.path().join("index.html.backup").exists());
    }

    #[test]
    fn test_bytes_outside_fixed_links_are_untouched() {
        let dir = TempDir::new().unwrap();
        let original = b"<p>caf\xe9 &copy</p><a href=\"javascript:void(0)\">x</a><p>\xff</p>";
        fs::write(dir.path().join("latin1.html"), original).unwrap();

        let report = LinkFixer::new(
            dir.path(),
            ReplacementPolicy::ExternalUrl("https://example.com/".to_string()),
        )
        .unwrap()
        .with_backups(false)
        .run()
        .unwrap();

        assert_eq!(report.links_fixed, 1);
        let fixed = fs::read(dir.path().join("latin1.html")).unwrap();
        assert!(fixed.starts_with(b"<p>caf\xe9 &copy</p><a "));
        assert!(fixed.ends_with(b">x</a><p>\xff</p>"));
        assert!(String::from_utf8_lossy(&fixed).contains(r#"href="https://example.com/""#));
    }

    #[test]
    fn test_missing_fallback_is_rejected() {
        let dir = site();
        let result = LinkFixer::new(
            dir.path(),
            ReplacementPolicy::LocalFallback("404.html".to_string()),
        );
        assert!(matches!(result, Err(MirrorError::Config(_))));
    }

    #[test]
    fn test_walk_files_sorted() {
        let dir = site();
        let files = walk_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec!["games/slots/index.html", "index.html", "notes.txt"]
        );
    }
}
