//! Reference rewriting
//!
//! Points every resolved reference of a page or stylesheet at its local file,
//! using paths relative to the rewritten document. Tokens whose target is unknown
//! are left byte-for-byte as written, so rewriting already rewritten output changes
//! nothing.

mod css;
mod html;
mod paths;

pub use css::rewrite_css;
pub use html::rewrite_html;
pub use paths::{page_local_path, relative_path, resolve_relative};

use crate::assets::Resolution;
use crate::crawler::extractor::Reference;
use crate::url::CanonicalUrl;
use std::collections::HashMap;

/// Answers where a page will live locally, if it is part of the mirror
pub trait PageLocator {
    fn local_path(&self, url: &CanonicalUrl) -> Option<String>;
}

/// Pages keyed by [`CanonicalUrl::page_key`]
impl PageLocator for HashMap<String, String> {
    fn local_path(&self, url: &CanonicalUrl) -> Option<String> {
        self.get(&url.page_key()).cloned()
    }
}

/// Bundle files that consolidated stylesheets and scripts are routed to
#[derive(Debug, Clone, Default)]
pub struct BundleRouting {
    pub stylesheet: Option<String>,
    pub script: Option<String>,
}

/// Everything the rewriter needs to know about one document
pub struct RewriteContext<'a> {
    /// Local path of the document being rewritten
    pub document_path: &'a str,
    /// Resolution of each asset the document references
    pub assets: &'a HashMap<CanonicalUrl, Resolution>,
    pub pages: &'a dyn PageLocator,
    /// Set when consolidation is on
    pub bundles: Option<&'a BundleRouting>,
}

/// Replacement text for an asset reference, or `None` to leave it alone
///
/// Local assets become relative paths; kept-external and unresolved assets get
/// their absolute URL so they still load from a file:// view.
fn asset_replacement(
    reference: &Reference,
    assets: &HashMap<CanonicalUrl, Resolution>,
    document_path: &str,
) -> Option<String> {
    let replacement = match assets.get(&reference.url)? {
        Resolution::Local(path) => with_fragment(
            relative_path(document_path, path.as_str()),
            reference.fragment(),
        ),
        Resolution::KeptExternal | Resolution::Unresolved(_) => reference.absolute.clone(),
    };

    (replacement != reference.token).then_some(replacement)
}

fn with_fragment(path: String, fragment: Option<&str>) -> String {
    match fragment {
        Some(fragment) => format!("{path}#{fragment}"),
        None => path,
    }
}
