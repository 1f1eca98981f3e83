//! Reference extraction from HTML and CSS
//!
//! Produces one [`Reference`] per http(s) URL token found in a document, in source
//! order, together with the exact site it came from so the rewriter can replace
//! that token and nothing else. Pseudo-schemes, `data:` payloads and fragment-only
//! tokens are not references.

use crate::assets::{AssetKind, FontPolicy};
use crate::document::{scan_css, srcset_candidates, CssTokenKind, HtmlDocument};
use crate::url::{classify_url, CanonicalUrl, UrlClass};
use std::ops::Range;
use tracing::debug;
use url::Url;

/// `rel` tokens of `<link>` elements that point at an icon image
const ICON_RELS: &[&str] = &[
    "icon",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
    "mask-icon",
];

/// Lazy-loading attributes carrying an image URL
const LAZY_IMAGE_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original"];

/// What a reference is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Stylesheet,
    Script,
    Image,
    Font,
    /// `<a href>`: a page, not an asset
    Anchor,
    /// `url()` inside a `style` attribute
    InlineStyleBackground,
    /// One candidate of a `srcset` list
    SrcsetCandidate,
    /// Media and anything else whose kind is only known from the response
    Other,
}

/// Where a reference token sits in its document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
    /// The whole value of attribute `attr` of tag `tag`
    Attribute { tag: usize, attr: usize },
    /// `range` within the decoded value of an attribute (srcset, style)
    AttributePart {
        tag: usize,
        attr: usize,
        range: Range<usize>,
    },
    /// `range` of a stylesheet's text
    Text { range: Range<usize> },
    /// `range` within the text of the `<style>` element `tag`
    StyleText { tag: usize, range: Range<usize> },
}

/// One outbound http(s) reference
#[derive(Debug, Clone)]
pub struct Reference {
    pub kind: RefKind,
    /// Token as written in the document
    pub token: String,
    /// Canonical target
    pub url: CanonicalUrl,
    /// Target resolved against the base with its fragment intact
    pub absolute: String,
    pub site: Site,
    /// The target should stay on its remote host
    pub keep_external: bool,
}

impl Reference {
    /// Asset kind requested from the registry; `None` for anchors
    pub fn asset_kind(&self) -> Option<AssetKind> {
        match self.kind {
            RefKind::Anchor => None,
            RefKind::Stylesheet => Some(AssetKind::Stylesheet),
            RefKind::Script => Some(AssetKind::Script),
            RefKind::Font => Some(AssetKind::Font),
            RefKind::Image | RefKind::SrcsetCandidate | RefKind::InlineStyleBackground => {
                Some(AssetKind::Image)
            }
            RefKind::Other => Some(AssetKind::from_url(&self.url).unwrap_or(AssetKind::Other)),
        }
    }

    /// Fragment of the written token, without `#`
    pub fn fragment(&self) -> Option<&str> {
        self.token
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .filter(|f| !f.is_empty())
    }

    /// A `<link rel=stylesheet>` or `<script src>`, i.e. a bundling candidate
    pub fn is_bundle_candidate(&self) -> bool {
        matches!(self.site, Site::Attribute { .. })
            && matches!(self.kind, RefKind::Stylesheet | RefKind::Script)
    }
}

/// Collects references from an HTML document served from `base`
pub fn extract_html(doc: &HtmlDocument, base: &Url, policy: &FontPolicy) -> Vec<Reference> {
    let mut refs = Vec::new();

    for (index, tag) in doc.tags().iter().enumerate() {
        let attribute = |name: &str, kind: RefKind, refs: &mut Vec<Reference>| {
            if let Some(attr) = tag.attr_index(name) {
                push(
                    refs,
                    kind,
                    &tag.attrs[attr].value,
                    Site::Attribute { tag: index, attr },
                    base,
                    policy,
                );
            }
        };

        match tag.name.as_str() {
            "link" => {
                let rels = tag.rel_tokens();
                if rels.iter().any(|r| r == "stylesheet") {
                    attribute("href", RefKind::Stylesheet, &mut refs);
                } else if rels.iter().any(|r| ICON_RELS.contains(&r.as_str())) {
                    attribute("href", RefKind::Image, &mut refs);
                } else if rels.iter().any(|r| r == "preload") && tag.attr("as") == Some("font") {
                    attribute("href", RefKind::Font, &mut refs);
                }
            }
            "script" => attribute("src", RefKind::Script, &mut refs),
            "img" | "amp-img" => {
                attribute("src", RefKind::Image, &mut refs);
                for &lazy in LAZY_IMAGE_ATTRS {
                    attribute(lazy, RefKind::Image, &mut refs);
                }
            }
            "source" | "video" | "audio" | "track" | "embed" => {
                attribute("src", RefKind::Other, &mut refs);
            }
            "input" if tag.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("image")) => {
                attribute("src", RefKind::Image, &mut refs);
            }
            "a" => attribute("href", RefKind::Anchor, &mut refs),
            _ => {}
        }

        if tag.name == "video" {
            attribute("poster", RefKind::Image, &mut refs);
        }

        for srcset_name in ["srcset", "data-srcset"] {
            let Some(attr) = tag.attr_index(srcset_name) else {
                continue;
            };
            let value = tag.attrs[attr].value.as_str();
            for range in srcset_candidates(value) {
                push(
                    &mut refs,
                    RefKind::SrcsetCandidate,
                    &value[range.clone()],
                    Site::AttributePart {
                        tag: index,
                        attr,
                        range,
                    },
                    base,
                    policy,
                );
            }
        }

        if let Some(attr) = tag.attr_index("style") {
            for token in scan_css(&tag.attrs[attr].value) {
                let kind = match css_url_kind(&token.value) {
                    RefKind::Font => RefKind::Font,
                    _ => RefKind::InlineStyleBackground,
                };
                push(
                    &mut refs,
                    kind,
                    &token.value,
                    Site::AttributePart {
                        tag: index,
                        attr,
                        range: token.range,
                    },
                    base,
                    policy,
                );
            }
        }

        if let Some(text) = tag.text.as_deref().filter(|_| tag.name == "style") {
            for mut reference in extract_css(text, base, policy) {
                if let Site::Text { range } = reference.site {
                    reference.site = Site::StyleText { tag: index, range };
                }
                refs.push(reference);
            }
        }
    }

    refs
}

/// Collects references from stylesheet text whose URL is `base`
pub fn extract_css(text: &str, base: &Url, policy: &FontPolicy) -> Vec<Reference> {
    let mut refs = Vec::new();

    for token in scan_css(text) {
        let kind = match token.kind {
            CssTokenKind::Import => RefKind::Stylesheet,
            CssTokenKind::Url => css_url_kind(&token.value),
        };
        push(
            &mut refs,
            kind,
            &token.value,
            Site::Text { range: token.range },
            base,
            policy,
        );
    }

    refs
}

/// Guesses the kind of a `url()` target from its extension
fn css_url_kind(token: &str) -> RefKind {
    let path = token.split(['?', '#']).next().unwrap_or_default();
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext);

    match ext.and_then(AssetKind::from_extension) {
        Some(AssetKind::Font) => RefKind::Font,
        Some(AssetKind::Image) => RefKind::Image,
        Some(AssetKind::Stylesheet) => RefKind::Stylesheet,
        _ => RefKind::Other,
    }
}

fn push(
    refs: &mut Vec<Reference>,
    kind: RefKind,
    token: &str,
    site: Site,
    base: &Url,
    policy: &FontPolicy,
) {
    let url = match classify_url(token, base) {
        Ok(UrlClass::Http(url)) => url,
        Ok(_) => return,
        Err(e) => {
            debug!("Skipping unresolvable reference {:?}: {}", token, e);
            return;
        }
    };

    let absolute = base
        .join(token.trim())
        .map(String::from)
        .unwrap_or_else(|_| url.to_string());

    let mut reference = Reference {
        kind,
        token: token.to_string(),
        url,
        absolute,
        site,
        keep_external: false,
    };
    reference.keep_external = reference
        .asset_kind()
        .is_some_and(|asset| policy.keeps_external(&reference.url, asset));

    refs.push(reference);
}
