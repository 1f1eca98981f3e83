//! Stylesheet and script consolidation
//!
//! With consolidation on, every locally materialized stylesheet is concatenated
//! into `css/all-styles.css` and every script into `js/all-scripts.js`, in the
//! order the crawl first referenced them. Pages link only the bundle.
//!
//! `@import` only works at the head of a stylesheet, so a stylesheet's local
//! imports are inlined where they stand and imports of sheets that are not in the
//! tree are moved to the head of the bundle.

use crate::assets::{LocalPath, Resolution};
use crate::document::{import_rules, splice};
use crate::output::OutputTree;
use crate::rewrite::{resolve_relative, BundleRouting};
use crate::url::CanonicalUrl;
use crate::MirrorError;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use tracing::{debug, info};

pub const STYLESHEET_BUNDLE: &str = "css/all-styles.css";
pub const SCRIPT_BUNDLE: &str = "js/all-scripts.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleKind {
    Stylesheet,
    Script,
}

impl BundleKind {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Stylesheet => STYLESHEET_BUNDLE,
            Self::Script => SCRIPT_BUNDLE,
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
        })
    }
}

/// One source file inside a bundle
#[derive(Debug, Clone)]
pub struct BundleSegment {
    pub source: CanonicalUrl,
    /// Byte range of the source's content within the bundle
    pub range: Range<usize>,
}

/// A written bundle file
#[derive(Debug, Clone)]
pub struct Bundle {
    pub kind: BundleKind,
    pub path: LocalPath,
    pub segments: Vec<BundleSegment>,
    /// Total size in bytes
    pub len: usize,
}

/// Bundle membership in first-reference order
#[derive(Debug, Default)]
pub struct ConsolidationPlan {
    entries: Vec<(BundleKind, CanonicalUrl)>,
    seen: HashSet<CanonicalUrl>,
}

impl ConsolidationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reference; only the first reference to a URL fixes its position
    pub fn note(&mut self, kind: BundleKind, url: &CanonicalUrl) {
        if self.seen.insert(url.clone()) {
            self.entries.push((kind, url.clone()));
        }
    }

    pub fn entries(&self, kind: BundleKind) -> impl Iterator<Item = &CanonicalUrl> {
        self.entries
            .iter()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, url)| url)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Where pages should point their consolidated references
    pub fn routing() -> BundleRouting {
        BundleRouting {
            stylesheet: Some(STYLESHEET_BUNDLE.to_string()),
            script: Some(SCRIPT_BUNDLE.to_string()),
        }
    }
}

/// Writes one bundle per kind from the planned sources
///
/// Only sources resolved to a local file take part; each is preceded by a
/// `/* Source: <url> */` comment. A stylesheet already inlined through an
/// `@import` is not repeated. A kind with no local sources gets no bundle.
pub fn consolidate<F>(
    plan: &ConsolidationPlan,
    resolution_of: F,
    output: &OutputTree,
) -> Result<Vec<Bundle>, MirrorError>
where
    F: Fn(&CanonicalUrl) -> Option<Resolution>,
{
    let mut bundles = Vec::new();

    for kind in [BundleKind::Stylesheet, BundleKind::Script] {
        let mut body: Vec<u8> = Vec::new();
        let mut segments = Vec::new();
        let mut included = HashSet::new();
        let mut hoisted = Vec::new();

        for url in plan.entries(kind) {
            let Some(Resolution::Local(path)) = resolution_of(url) else {
                debug!("Skipping {} {} in bundle: not materialized", kind, url);
                continue;
            };
            if !included.insert(path.as_str().to_ascii_lowercase()) {
                debug!("{} is already in the bundle through an @import", url);
                continue;
            }

            let bytes = match kind {
                BundleKind::Stylesheet => {
                    inline_imports(output, path.as_str(), &mut included, &mut hoisted)?
                }
                BundleKind::Script => output.read(path.as_str())?,
            };
            body.extend_from_slice(format!("/* Source: {} */\n", url).as_bytes());
            let start = body.len();
            body.extend_from_slice(&bytes);
            segments.push(BundleSegment {
                source: url.clone(),
                range: start..body.len(),
            });
            body.extend_from_slice(b"\n\n");
        }

        if segments.is_empty() {
            continue;
        }

        let mut content: Vec<u8> = Vec::new();
        for rule in &hoisted {
            content.extend_from_slice(rule.as_bytes());
            content.push(b'\n');
        }
        if !hoisted.is_empty() {
            content.push(b'\n');
        }
        let offset = content.len();
        content.extend_from_slice(&body);
        for segment in &mut segments {
            segment.range = segment.range.start + offset..segment.range.end + offset;
        }

        output.write(kind.path(), &content)?;
        info!(
            "Wrote {} bundle {} from {} sources",
            kind,
            kind.path(),
            segments.len()
        );

        bundles.push(Bundle {
            kind,
            path: LocalPath::new(kind.path()),
            segments,
            len: content.len(),
        });
    }

    Ok(bundles)
}

/// A stylesheet's bytes with its local `@import`s replaced by the imported text
///
/// Each local sheet is inlined once, at its first import, wrapped in `@media`
/// when the import has a media list. Imports of sheets already in the bundle are
/// dropped, and imports of sheets not in the tree are moved to `hoisted`.
fn inline_imports(
    output: &OutputTree,
    path: &str,
    included: &mut HashSet<String>,
    hoisted: &mut Vec<String>,
) -> Result<Vec<u8>, MirrorError> {
    let bytes = output.read(path)?;
    let Ok(text) = std::str::from_utf8(&bytes) else {
        return Ok(bytes);
    };
    let rules = import_rules(text);
    if rules.is_empty() {
        return Ok(bytes);
    }

    let mut edits = Vec::with_capacity(rules.len());
    for rule in rules {
        let target = resolve_relative(path, &rule.target).filter(|t| output.exists(t));
        let replacement = match target {
            None => {
                let written = text[rule.range.clone()].to_string();
                if !hoisted.contains(&written) {
                    hoisted.push(written);
                }
                String::new()
            }
            Some(target) if !included.insert(target.to_ascii_lowercase()) => String::new(),
            Some(target) => {
                let inner = inline_imports(output, &target, included, hoisted)?;
                let inlined = format!(
                    "/* Imported: {} */\n{}\n",
                    target,
                    String::from_utf8_lossy(&inner)
                );
                if rule.media.is_empty() {
                    inlined
                } else {
                    format!("@media {} {{\n{}}}\n", rule.media, inlined)
                }
            }
        };
        edits.push((rule.range, replacement));
    }

    Ok(splice(text, edits).into_bytes())
}
