//! Parsed-document capability shared by the extractor, the rewriter and the link fixer
//!
//! Documents are never re-serialized from a tree. [`HtmlDocument`] streams the
//! page through `lol_html` and edits only the tags it is told to, and CSS is
//! scanned for `url()` and `@import` tokens with their spans so replacement text
//! is spliced into exactly those spans. Every untouched byte survives verbatim.

pub mod css;
pub mod html;
pub mod meta;

pub use css::{import_rules, scan_css, CssToken, CssTokenKind, ImportRule};
pub use html::{srcset_candidates, Attribute, Edit, HtmlDocument, Tag};
pub use meta::{detect_base_url, page_title};

use std::ops::Range;

/// Replaces each range of `text` with its paired string
///
/// Edits are applied in order of their start offset. An edit overlapping an
/// earlier one is dropped.
pub fn splice(text: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| (range.start, range.end));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for (range, replacement) in edits {
        if range.start < cursor || range.end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }

    out.push_str(&text[cursor..]);
    out
}
