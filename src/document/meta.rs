//! Read-only document metadata via scraper

use scraper::{Html, Selector};
use url::Url;

/// Extracts the page title from an HTML document
///
/// # Example
///
/// ```
/// use sumi_mirror::document::page_title;
///
/// let html = "<html><head><title> Home </title></head></html>";
/// assert_eq!(page_title(html), Some("Home".to_string()));
/// ```
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Guesses the URL a saved HTML file was originally served from
///
/// Uses an absolute `<base href>` when present, otherwise the origin of the first
/// absolute http(s) URL in a `link[href]`, `script[src]`, `img[src]` or `a[href]`.
pub fn detect_base_url(html: &str) -> Option<Url> {
    let document = Html::parse_document(html);

    if let Ok(base_selector) = Selector::parse("base[href]") {
        let base = document
            .select(&base_selector)
            .filter_map(|e| e.value().attr("href"))
            .find_map(absolute_http);
        if base.is_some() {
            return base;
        }
    }

    let candidates = [
        ("link[href]", "href"),
        ("script[src]", "src"),
        ("img[src]", "src"),
        ("a[href]", "href"),
    ];

    for (selector, attr) in candidates {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let origin = document
            .select(&selector)
            .filter_map(|e| e.value().attr(attr))
            .find_map(absolute_http)
            .and_then(|url| Url::parse(&url.origin().ascii_serialization()).ok());
        if origin.is_some() {
            return origin;
        }
    }

    None
}

fn absolute_http(raw: &str) -> Option<Url> {
    Url::parse(raw.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}
