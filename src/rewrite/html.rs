use super::{asset_replacement, relative_path, with_fragment, RewriteContext};
use crate::assets::Resolution;
use crate::crawler::extractor::{RefKind, Reference, Site};
use crate::document::{splice, Edit, HtmlDocument};
use crate::MirrorError;
use std::collections::BTreeMap;
use std::ops::Range;

/// Rewrites a page's references and returns the new document text
///
/// Anchors to pages in the mirror become relative paths with their fragment kept;
/// other anchors are left for the link fixer. A `<base>` element is removed since
/// every rewritten reference is relative to the document itself. With bundle
/// routing, the first consolidated stylesheet or script of each type is retargeted
/// to its bundle and the rest are removed.
pub fn rewrite_html(
    doc: &HtmlDocument,
    refs: &[Reference],
    ctx: &RewriteContext<'_>,
) -> Result<Vec<u8>, MirrorError> {
    let mut edits = Vec::new();
    let mut parts: BTreeMap<(usize, usize), Vec<(Range<usize>, String)>> = BTreeMap::new();
    let mut styles: BTreeMap<usize, Vec<(Range<usize>, String)>> = BTreeMap::new();
    let mut bundles_linked = (false, false);

    for reference in refs {
        if let Some(bundle_edit) = bundle_edit(reference, ctx, &mut bundles_linked) {
            if let Edit::SetAttribute { tag, .. } = &bundle_edit {
                edits.extend(drop_integrity(doc, *tag));
            }
            edits.push(bundle_edit);
            continue;
        }

        let replacement = match reference.kind {
            RefKind::Anchor => anchor_replacement(reference, ctx),
            _ => asset_replacement(reference, ctx.assets, ctx.document_path),
        };
        let Some(replacement) = replacement else {
            continue;
        };

        match &reference.site {
            Site::Attribute { tag, attr } => {
                if reference.is_bundle_candidate() {
                    edits.extend(drop_integrity(doc, *tag));
                }
                edits.push(Edit::SetAttribute {
                    tag: *tag,
                    attr: *attr,
                    value: replacement,
                });
            }
            Site::AttributePart { tag, attr, range } => {
                parts
                    .entry((*tag, *attr))
                    .or_default()
                    .push((range.clone(), replacement));
            }
            Site::StyleText { tag, range } => {
                styles
                    .entry(*tag)
                    .or_default()
                    .push((range.clone(), replacement));
            }
            Site::Text { .. } => {}
        }
    }

    for ((tag, attr), substitutions) in parts {
        let original = &doc.tags()[tag].attrs[attr].value;
        edits.push(Edit::SetAttribute {
            tag,
            attr,
            value: splice(original, substitutions),
        });
    }

    for (tag, substitutions) in styles {
        let Some(original) = doc.tags()[tag].text.as_deref() else {
            continue;
        };
        edits.push(Edit::SetStyleText {
            tag,
            text: splice(original, substitutions),
        });
    }

    if let Some((base_tag, _)) = doc.base_href() {
        edits.push(Edit::RemoveElement { tag: base_tag });
    }

    doc.apply(edits)
}

/// Subresource integrity no longer holds once the target is a rewritten local copy
fn drop_integrity(doc: &HtmlDocument, tag: usize) -> Option<Edit> {
    let attr = doc.tags()[tag].attr_index("integrity")?;
    Some(Edit::RemoveAttribute { tag, attr })
}

fn anchor_replacement(reference: &Reference, ctx: &RewriteContext<'_>) -> Option<String> {
    let path = ctx.pages.local_path(&reference.url)?;
    let replacement = with_fragment(
        relative_path(ctx.document_path, &path),
        reference.fragment(),
    );

    (replacement != reference.token).then_some(replacement)
}

/// Edit routing a locally resolved `<link>`/`<script>` into its bundle
fn bundle_edit(
    reference: &Reference,
    ctx: &RewriteContext<'_>,
    linked: &mut (bool, bool),
) -> Option<Edit> {
    let routing = ctx.bundles?;
    if !reference.is_bundle_candidate() {
        return None;
    }
    let Some(Resolution::Local(_)) = ctx.assets.get(&reference.url) else {
        return None;
    };
    let Site::Attribute { tag, attr } = reference.site else {
        return None;
    };

    let (bundle, already_linked) = match reference.kind {
        RefKind::Stylesheet => (routing.stylesheet.as_deref()?, &mut linked.0),
        RefKind::Script => (routing.script.as_deref()?, &mut linked.1),
        _ => return None,
    };

    if *already_linked {
        return Some(Edit::RemoveElement { tag });
    }
    *already_linked = true;

    Some(Edit::SetAttribute {
        tag,
        attr,
        value: relative_path(ctx.document_path, bundle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{FontPolicy, LocalPath};
    use crate::crawler::extractor::extract_html;
    use crate::rewrite::BundleRouting;
    use crate::url::{normalize_url, CanonicalUrl};
    use std::collections::HashMap;
    use url::Url;

    const PAGE_URL: &str = "https://example.com/blog/post";

    fn assets() -> HashMap<CanonicalUrl, Resolution> {
        HashMap::from([
            (
                normalize_url("https://example.com/css/site.css").unwrap(),
                Resolution::Local(LocalPath::new("css/site.css")),
            ),
            (
                normalize_url("https://example.com/css/extra.css").unwrap(),
                Resolution::Local(LocalPath::new("css/extra.css")),
            ),
            (
                normalize_url("https://example.com/img/a.jpg").unwrap(),
                Resolution::Local(LocalPath::new("images/a.jpg")),
            ),
            (
                normalize_url("https://example.com/img/b.jpg").unwrap(),
                Resolution::Local(LocalPath::new("images/b.jpg")),
            ),
            (
                normalize_url("https://example.com/js/gone.js").unwrap(),
                Resolution::Unresolved("HTTP status 404".to_string()),
            ),
        ])
    }

    fn pages() -> HashMap<String, String> {
        HashMap::from([
            ("https://example.com/".to_string(), "index.html".to_string()),
            (
                "https://example.com/about".to_string(),
                "about/index.html".to_string(),
            ),
        ])
    }

    fn rewrite(html: &str, bundles: Option<&BundleRouting>) -> String {
        let doc = HtmlDocument::parse(html).unwrap();
        let refs = extract_html(&doc, &Url::parse(PAGE_URL).unwrap(), &FontPolicy::disabled());
        let assets = assets();
        let pages = pages();
        let ctx = RewriteContext {
            document_path: "blog/post/index.html",
            assets: &assets,
            pages: &pages,
            bundles,
        };
        String::from_utf8(rewrite_html(&doc, &refs, &ctx).unwrap()).unwrap()
    }

    #[test]
    fn test_assets_rewritten_relative_to_page() {
        let out = rewrite(
            r#"<link rel="stylesheet" href="/css/site.css"><img src="../img/a.jpg" alt="A">"#,
            None,
        );
        assert_eq!(
            out,
            r#"<link rel="stylesheet" href="../../css/site.css"><img src="../../images/a.jpg" alt="A">"#
        );
    }

    #[test]
    fn test_anchors_keep_fragment_and_unknown_pages_untouched() {
        let out = rewrite(
            r##"<a href="/about#team">About</a><a href="/pricing">P</a><a href="#top">Top</a>"##,
            None,
        );
        assert_eq!(
            out,
            r##"<a href="../../about/index.html#team">About</a><a href="/pricing">P</a><a href="#top">Top</a>"##
        );
    }

    #[test]
    fn test_srcset_and_inline_style() {
        let out = rewrite(
            r#"<img srcset="/img/a.jpg 1x, /img/b.jpg 2x"><div style="background:url(/img/a.jpg)"></div>"#,
            None,
        );
        assert_eq!(
            out,
            r#"<img srcset="../../images/a.jpg 1x, ../../images/b.jpg 2x"><div style="background:url(../../images/a.jpg)"></div>"#
        );
    }

    #[test]
    fn test_style_block_rewritten() {
        let out = rewrite(
            "<style>h1{background:url(/img/a.jpg)} p{color:red}</style><p>x</p>",
            None,
        );
        assert_eq!(
            out,
            "<style>h1{background:url(../../images/a.jpg)} p{color:red}</style><p>x</p>"
        );
    }

    #[test]
    fn test_tags_after_apostrophe_in_unquoted_value_are_rewritten() {
        let out = rewrite(
            r#"<p title=don't>x</p><img src="/img/a.jpg"><link rel="stylesheet" href="/css/site.css"><p>it's</p>"#,
            None,
        );
        assert!(out.starts_with("<p title=don't>x</p>"));
        assert!(out.contains(r#"src="../../images/a.jpg""#));
        assert!(out.contains(r#"href="../../css/site.css""#));
        assert!(out.ends_with("<p>it's</p>"));
    }

    #[test]
    fn test_unresolved_asset_left_absolute() {
        let out = rewrite(r#"<script src="/js/gone.js"></script>"#, None);
        assert_eq!(
            out,
            r#"<script src="https://example.com/js/gone.js"></script>"#
        );
    }

    #[test]
    fn test_base_removed() {
        let out = rewrite(
            r#"<head><base href="https://example.com/"></head><img src="img/a.jpg">"#,
            None,
        );
        assert_eq!(out, r#"<head></head><img src="img/a.jpg">"#);
    }

    #[test]
    fn test_integrity_dropped_from_rewritten_stylesheet() {
        let out = rewrite(
            r#"<link rel="stylesheet" href="/css/site.css" integrity="sha384-abc" crossorigin>"#,
            None,
        );
        assert_eq!(
            out,
            r#"<link rel="stylesheet" href="../../css/site.css" crossorigin>"#
        );
    }

    #[test]
    fn test_bundle_routing() {
        let routing = BundleRouting {
            stylesheet: Some("css/all-styles.css".to_string()),
            script: None,
        };
        let out = rewrite(
            r#"<link rel="stylesheet" href="/css/site.css"><link rel="stylesheet" href="/css/extra.css"><p>"#,
            Some(&routing),
        );
        assert_eq!(
            out,
            r#"<link rel="stylesheet" href="../../css/all-styles.css"><p>"#
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let html = r##"<link rel="stylesheet" href="/css/site.css">
            <a href="/about#team">About</a><a href="/pricing">P</a>
            <img srcset="/img/a.jpg 1x" src="/img/b.jpg"><script src="/js/gone.js"></script>"##;
        let once = rewrite(html, None);
        let twice = rewrite(&once, None);
        assert_eq!(once, twice);
    }
}
