//! Minimal CSS reference tokenizer
//!
//! Scans for `url(...)` and `@import` tokens only. This is not a CSS parser: it
//! does not understand escapes, and anything that is not one of those two token
//! shapes is passed through untouched.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// `@import url(..)`, `@import ".."`, or a bare `url(..)`; one value group per quoting style
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)@import\s+(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)|"([^"]*)"|'([^']*)')|url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#,
    )
    .expect("css reference regex is valid")
});

static COMMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("css comment regex is valid"));

/// A whole `@import` rule: the target in one of five quoting groups, then the media list
static IMPORT_RULE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)@import\s+(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)|"([^"]*)"|'([^']*)')([^;{}]*);?"#,
    )
    .expect("css import rule regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssTokenKind {
    /// `@import` target, itself a stylesheet
    Import,
    /// `url(...)` in a declaration (fonts, backgrounds, cursors, ...)
    Url,
}

/// One URL token in a stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssToken {
    pub kind: CssTokenKind,
    /// The URL text exactly as written between the quotes/parentheses
    pub value: String,
    /// Byte range of `value` within the scanned text
    pub range: Range<usize>,
}

/// One `@import` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRule {
    /// The rule from `@import` through its `;`
    pub range: Range<usize>,
    pub target: String,
    /// Media query list, trimmed; empty when the import is unconditional
    pub media: String,
}

fn comment_ranges(text: &str) -> Vec<Range<usize>> {
    COMMENT_PATTERN
        .find_iter(text)
        .map(|m| m.range())
        .collect()
}

/// Returns the URL tokens of `text` in source order, skipping comments and empty values
pub fn scan_css(text: &str) -> Vec<CssToken> {
    let comments = comment_ranges(text);
    let in_comment = |offset: usize| comments.iter().any(|c| c.contains(&offset));

    REFERENCE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if in_comment(whole.start()) {
                return None;
            }

            let (index, value) = (1..=8).find_map(|i| caps.get(i).map(|m| (i, m)))?;
            if value.as_str().trim().is_empty() {
                return None;
            }

            let kind = if index <= 5 {
                CssTokenKind::Import
            } else {
                CssTokenKind::Url
            };

            Some(CssToken {
                kind,
                value: value.as_str().to_string(),
                range: value.range(),
            })
        })
        .collect()
}

/// Returns the `@import` rules of `text` outside comments, in source order
pub fn import_rules(text: &str) -> Vec<ImportRule> {
    let comments = comment_ranges(text);

    IMPORT_RULE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if comments.iter().any(|c| c.contains(&whole.start())) {
                return None;
            }
            let target = (1..=5).find_map(|i| caps.get(i))?.as_str().trim();
            if target.is_empty() {
                return None;
            }

            Some(ImportRule {
                range: whole.range(),
                target: target.to_string(),
                media: caps
                    .get(6)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            })
        })
        .collect()
}
