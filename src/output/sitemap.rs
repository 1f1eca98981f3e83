//! `sitemap.html`: a browsable index of every page in the mirror

use super::OutputTree;
use crate::MirrorError;

pub const SITEMAP_FILE: &str = "sitemap.html";

/// One fetched page
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub url: String,
    pub local_path: String,
    pub title: Option<String>,
}

/// Renders the sitemap document; entries appear in the order given
pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Sitemap</title>\n</head>\n<body>\n");
    html.push_str(&format!("<h1>Sitemap ({} pages)</h1>\n<ul>\n", entries.len()));

    for entry in entries {
        let label = entry.title.as_deref().unwrap_or(&entry.url);
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a> <small>{}</small></li>\n",
            escape(&entry.local_path),
            escape(label),
            escape(&entry.url)
        ));
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// Writes `sitemap.html` at the root of the tree
pub fn write_sitemap(output: &OutputTree, entries: &[SitemapEntry]) -> Result<(), MirrorError> {
    output.write(SITEMAP_FILE, render_sitemap(entries).as_bytes())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
