use super::asset_replacement;
use crate::assets::Resolution;
use crate::crawler::extractor::{Reference, Site};
use crate::document::splice;
use crate::url::CanonicalUrl;
use std::collections::HashMap;

/// Rewrites the `url()` and `@import` tokens of a stylesheet stored at `css_path`
pub fn rewrite_css(
    text: &str,
    refs: &[Reference],
    assets: &HashMap<CanonicalUrl, Resolution>,
    css_path: &str,
) -> String {
    let edits = refs
        .iter()
        .filter_map(|reference| {
            let Site::Text { range } = &reference.site else {
                return None;
            };
            asset_replacement(reference, assets, css_path).map(|text| (range.clone(), text))
        })
        .collect();

    splice(text, edits)
}
