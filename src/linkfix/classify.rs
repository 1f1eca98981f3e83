//! Anchor classification against a directory on disk

use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// What an anchor's `href` points at in a materialized tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkClass {
    /// Empty or `#fragment`
    AnchorOnly,
    Mailto,
    Tel,
    /// `javascript:` and the other script pseudo-schemes
    JavascriptPseudo,
    /// `http(s):` or protocol-relative
    External,
    LocalExisting,
    /// A local path absent from the tree, or a scheme no browser can follow offline
    LocalMissing,
}

impl LinkClass {
    /// Only these classes are ever rewritten; every other class is preserved
    pub fn needs_fix(&self) -> bool {
        matches!(self, Self::JavascriptPseudo | Self::LocalMissing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnchorOnly => "anchor-only",
            Self::Mailto => "mailto",
            Self::Tel => "tel",
            Self::JavascriptPseudo => "javascript-pseudo",
            Self::External => "external-http",
            Self::LocalExisting => "local-existing",
            Self::LocalMissing => "local-missing",
        }
    }
}

impl fmt::Display for LinkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script schemes a browser executes instead of navigating
const PSEUDO_SCHEMES: &[&str] = &["javascript", "vbscript", "livescript"];

/// Classifies an anchor `href` found in `file`
///
/// Only `http(s):`, protocol-relative, `mailto:`, `tel:` and fragment-only hrefs
/// are recognized as preserved kinds; any other scheme is treated as broken. The
/// href is cleaned the way browsers clean it first, so `java\tscript:` is still
/// a pseudo-scheme.
///
/// Relative hrefs resolve against the file's directory and root-absolute ones
/// against `root`; both paths must be absolute. A local target exists if the path
/// itself, the path with `.html` appended, or `<path>/index.html` is present.
pub fn classify_href(href: &str, file: &Path, root: &Path) -> LinkClass {
    let cleaned = clean_href(href);
    if cleaned.is_empty() || cleaned.starts_with('#') {
        return LinkClass::AnchorOnly;
    }
    if cleaned.starts_with("//") {
        return LinkClass::External;
    }

    if let Some(scheme) = scheme_of(&cleaned) {
        return match scheme.as_str() {
            "http" | "https" => LinkClass::External,
            "mailto" => LinkClass::Mailto,
            "tel" => LinkClass::Tel,
            s if PSEUDO_SCHEMES.contains(&s) => LinkClass::JavascriptPseudo,
            _ => LinkClass::LocalMissing,
        };
    }

    match local_target(&cleaned, file, root) {
        Some(path) if target_exists(&path) => LinkClass::LocalExisting,
        _ => LinkClass::LocalMissing,
    }
}

/// Drops surrounding controls and spaces, and every tab and newline
fn clean_href(href: &str) -> String {
    href.trim_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Lowercased scheme of an absolute URL string
fn scheme_of(href: &str) -> Option<String> {
    let (scheme, _) = href.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

/// Filesystem path a local href points at, percent-decoded, query and fragment dropped
fn local_target(href: &str, file: &Path, root: &Path) -> Option<PathBuf> {
    let (base, relative) = match href.strip_prefix('/') {
        Some(rest) => (Url::from_directory_path(root).ok()?, rest),
        None => (Url::from_file_path(file).ok()?, href),
    };

    let mut target = base.join(relative).ok()?;
    target.set_query(None);
    target.set_fragment(None);
    target.to_file_path().ok()
}

fn target_exists(path: &Path) -> bool {
    if path.exists() {
        return true;
    }

    let mut with_html = path.as_os_str().to_owned();
    with_html.push(".html");
    PathBuf::from(with_html).is_file() || path.join("index.html").is_file()
}
