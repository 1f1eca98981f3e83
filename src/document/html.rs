//! Span-preserving HTML model built on `lol_html`
//!
//! A document is tokenized once to record its start tags in order. Edits refer to
//! tags by that order and are applied by a second streaming pass, so every byte the
//! edits do not touch is copied through verbatim.

use crate::MirrorError;
use html_escape::{decode_html_entities, encode_double_quoted_attribute};
use lol_html::html_content::ContentType;
use lol_html::{element, text, HtmlRewriter, OutputSink, Settings};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Range;

/// An attribute of a start tag
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Lowercased attribute name
    pub name: String,
    /// Entity-decoded value; empty for a bare boolean attribute
    pub value: String,
}

/// A start tag
#[derive(Debug, Clone)]
pub struct Tag {
    /// Lowercased element name
    pub name: String,
    pub attrs: Vec<Attribute>,
    /// Raw text content of a `<style>` element
    pub text: Option<String>,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.attrs.iter().position(|a| a.name == name)
    }

    /// Whitespace-separated, lowercased tokens of `rel`
    pub fn rel_tokens(&self) -> Vec<String> {
        self.attr("rel")
            .map(|rel| {
                rel.split_ascii_whitespace()
                    .map(|t| t.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A change to apply to an [`HtmlDocument`]
#[derive(Debug, Clone)]
pub enum Edit {
    /// Replace an attribute's value (written double-quoted and escaped)
    SetAttribute {
        tag: usize,
        attr: usize,
        value: String,
    },
    /// Replace the whole text of a `<style>` element
    SetStyleText { tag: usize, text: String },
    /// Drop one attribute, name and value
    RemoveAttribute { tag: usize, attr: usize },
    /// Remove a whole element with its content
    RemoveElement { tag: usize },
}

/// Pending changes for one start tag
#[derive(Debug, Default)]
struct TagChanges {
    set: Vec<(String, String)>,
    remove_attrs: Vec<String>,
    text: Option<String>,
    remove: bool,
}

/// An HTML document and its start tags in document order
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    source: Vec<u8>,
    tags: Vec<Tag>,
}

impl HtmlDocument {
    /// Tokenizes `source` and records every start tag
    ///
    /// Comments, doctypes and the raw text of `<script>`/`<style>` never yield tags.
    /// Bytes that are not valid UTF-8 are kept as-is.
    pub fn parse(source: impl Into<Vec<u8>>) -> Result<Self, MirrorError> {
        let source = source.into();
        let tags = RefCell::new(Vec::new());

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("*", |el| {
                        let attrs = el
                            .attributes()
                            .iter()
                            .map(|a| Attribute {
                                name: a.name().to_ascii_lowercase(),
                                value: decode_html_entities(&a.value()).into_owned(),
                            })
                            .collect();
                        tags.borrow_mut().push(Tag {
                            name: el.tag_name().to_ascii_lowercase(),
                            attrs,
                            text: None,
                        });
                        Ok(())
                    }),
                    text!("style", |chunk| {
                        // Raw text: no element can start before the style closes.
                        if let Some(style) = tags.borrow_mut().last_mut() {
                            style
                                .text
                                .get_or_insert_with(String::new)
                                .push_str(chunk.as_str());
                        }
                        Ok(())
                    }),
                ],
                strict: false,
                ..Settings::default()
            },
            NoopSink,
        );
        rewriter.write(&source)?;
        rewriter.end()?;

        Ok(Self {
            source,
            tags: tags.into_inner(),
        })
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Source decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.source)
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// First `<base href>` value, if any
    pub fn base_href(&self) -> Option<(usize, &str)> {
        self.tags
            .iter()
            .enumerate()
            .find(|(_, t)| t.name == "base" && t.attr("href").is_some())
            .and_then(|(i, t)| t.attr("href").map(|href| (i, href)))
    }

    /// Applies edits and returns the new document bytes
    pub fn apply(&self, edits: Vec<Edit>) -> Result<Vec<u8>, MirrorError> {
        if edits.is_empty() {
            return Ok(self.source.clone());
        }

        let mut changes: HashMap<usize, TagChanges> = HashMap::new();
        for edit in edits {
            match edit {
                Edit::SetAttribute { tag, attr, value } => {
                    if let Some(name) = self.attr_name(tag, attr) {
                        changes.entry(tag).or_default().set.push((name, value));
                    }
                }
                Edit::SetStyleText { tag, text } => {
                    changes.entry(tag).or_default().text = Some(text);
                }
                Edit::RemoveAttribute { tag, attr } => {
                    if let Some(name) = self.attr_name(tag, attr) {
                        changes.entry(tag).or_default().remove_attrs.push(name);
                    }
                }
                Edit::RemoveElement { tag } => changes.entry(tag).or_default().remove = true,
            }
        }

        let ordinal = Cell::new(0usize);
        let style_text: Cell<Option<&str>> = Cell::new(None);
        let mut output = Vec::with_capacity(self.source.len());

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("*", |el| {
                        let index = ordinal.get();
                        ordinal.set(index + 1);

                        let Some(change) = changes.get(&index) else {
                            style_text.set(None);
                            return Ok(());
                        };
                        style_text.set(change.text.as_deref());

                        if change.remove {
                            el.remove();
                            return Ok(());
                        }
                        for name in &change.remove_attrs {
                            el.remove_attribute(name);
                        }
                        for (name, value) in &change.set {
                            el.set_attribute(name, &encode_double_quoted_attribute(value))?;
                        }
                        Ok(())
                    }),
                    text!("style", |chunk| {
                        if let Some(text) = style_text.get() {
                            if chunk.last_in_text_node() {
                                chunk.replace(text, ContentType::Html);
                            } else {
                                chunk.remove();
                            }
                        }
                        Ok(())
                    }),
                ],
                strict: false,
                ..Settings::default()
            },
            |bytes: &[u8]| output.extend_from_slice(bytes),
        );
        rewriter.write(&self.source)?;
        rewriter.end()?;

        Ok(output)
    }

    fn attr_name(&self, tag: usize, attr: usize) -> Option<String> {
        self.tags
            .get(tag)
            .and_then(|t| t.attrs.get(attr))
            .map(|a| a.name.clone())
    }
}

struct NoopSink;

impl OutputSink for NoopSink {
    fn handle_chunk(&mut self, _chunk: &[u8]) {}
}

/// Splits a `srcset` value into the byte ranges of its candidate URLs
///
/// Follows the HTML candidate grammar loosely: a URL runs to the next whitespace
/// (trailing commas excluded), and descriptors run to the next comma.
pub fn srcset_candidates(value: &str) -> Vec<Range<usize>> {
    let bytes = value.as_bytes();
    let mut ranges = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut end = pos;
        let trailing_comma = bytes[end - 1] == b',';
        while end > start && bytes[end - 1] == b',' {
            end -= 1;
        }
        if end > start {
            ranges.push(start..end);
        }
        if trailing_comma {
            continue;
        }

        let mut depth = 0usize;
        while pos < bytes.len() {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => break,
                _ => {}
            }
            pos += 1;
        }
    }

    ranges
}
