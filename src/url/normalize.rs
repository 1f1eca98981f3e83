use crate::UrlError;
use std::fmt;
use url::Url;

/// A normalized absolute http(s) URL used as the identity key for pages and assets
///
/// Two URLs differing only by fragment, default port, host case, dot segments or
/// duplicate slashes compare equal. Query strings are kept verbatim, so
/// `style.css?v=1` and `style.css?v=2` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Lowercase host name, without port
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Page identity: the canonical URL with its query string dropped
    pub fn page_key(&self) -> String {
        let mut url = self.0.clone();
        url.set_query(None);
        url.into()
    }

    /// Returns true if both URLs share a host
    pub fn same_host(&self, other: &CanonicalUrl) -> bool {
        self.host() == other.host()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// What a reference token in a document points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlClass {
    /// A fetchable http(s) resource
    Http(CanonicalUrl),
    /// `#fragment` (or an empty token) addressing the current document
    AnchorOnly(String),
    Mailto,
    Tel,
    JavascriptPseudo,
    /// Inline `data:` payload, never fetched
    Data,
    /// Any other scheme (ftp:, sms:, ...)
    OtherScheme(String),
}

impl UrlClass {
    pub fn as_http(&self) -> Option<&CanonicalUrl> {
        match self {
            Self::Http(url) => Some(url),
            _ => None,
        }
    }
}

/// Normalizes an absolute URL according to Sumi-Mirror's normalization rules
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an http or https scheme and a host
/// 3. Lowercase scheme and host, drop default ports (80/443)
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse duplicate slashes
///    - Remove trailing slash (except for root /)
/// 5. Remove fragment
/// 6. Keep the query string exactly as given
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/a//b/../page/?v=2#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/page?v=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<CanonicalUrl, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

/// Resolves a (possibly relative) token against `base` and normalizes the result
pub fn resolve_url(token: &str, base: &Url) -> Result<CanonicalUrl, UrlError> {
    let url = base
        .join(token.trim())
        .map_err(|e| UrlError::Malformed(format!("{}: {}", token, e)))?;
    canonicalize(url)
}

/// Classifies a reference token found in a document served from `base`
///
/// Pseudo-schemes are recognized case-insensitively before resolution. Returns
/// `UrlError::Malformed` when the token cannot be resolved at all.
pub fn classify_url(token: &str, base: &Url) -> Result<UrlClass, UrlError> {
    let trimmed = token.trim();

    if trimmed.is_empty() {
        return Ok(UrlClass::AnchorOnly(String::new()));
    }
    if let Some(fragment) = trimmed.strip_prefix('#') {
        return Ok(UrlClass::AnchorOnly(fragment.to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("javascript:") {
        return Ok(UrlClass::JavascriptPseudo);
    }
    if lower.starts_with("mailto:") {
        return Ok(UrlClass::Mailto);
    }
    if lower.starts_with("tel:") {
        return Ok(UrlClass::Tel);
    }
    if lower.starts_with("data:") {
        return Ok(UrlClass::Data);
    }

    let joined = base
        .join(trimmed)
        .map_err(|e| UrlError::Malformed(format!("{}: {}", trimmed, e)))?;

    match joined.scheme() {
        "http" | "https" => canonicalize(joined).map(UrlClass::Http),
        other => Ok(UrlClass::OtherScheme(other.to_string())),
    }
}

fn canonicalize(mut url: Url) -> Result<CanonicalUrl, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            // The url crate already lowercases hosts of special schemes; IP
            // literals and IDNA output pass through unchanged.
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        _ => return Err(UrlError::MissingDomain),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);
    url.set_fragment(None);

    Ok(CanonicalUrl(url))
}

/// Normalizes a URL path by removing dot segments, empty segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post/").unwrap()
    }

    #[test]
    fn test_lowercase_scheme_and_host() {
        let result = normalize_url("HTTPS://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_default_port_dropped() {
        let a = normalize_url("https://example.com:443/x").unwrap();
        let b = normalize_url("https://example.com/x").unwrap();
        assert_eq!(a, b);

        let c = normalize_url("http://example.com:80/x").unwrap();
        assert_eq!(c.as_str(), "http://example.com/x");
    }

    #[test]
    fn test_non_default_port_kept() {
        let result = normalize_url("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(result.as_str(), "http://127.0.0.1:8080/x");
        assert_eq!(result.host(), "127.0.0.1");
    }

    #[test]
    fn test_fragment_removed() {
        let a = normalize_url("https://example.com/page#section").unwrap();
        let b = normalize_url("https://example.com/page").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_preserved_verbatim() {
        let v1 = normalize_url("https://example.com/style.css?v=1").unwrap();
        let v2 = normalize_url("https://example.com/style.css?v=2").unwrap();
        assert_ne!(v1, v2);

        let unsorted = normalize_url("https://example.com/p?b=2&a=1&utm_source=x").unwrap();
        assert_eq!(
            unsorted.as_str(),
            "https://example.com/p?b=2&a=1&utm_source=x"
        );
    }

    #[test]
    fn test_path_segments_collapsed() {
        let result = normalize_url("https://example.com///a/./b/../c//d/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/a/c/d");
    }

    #[test]
    fn test_keep_root_slash() {
        assert_eq!(
            normalize_url("https://example.com").unwrap().as_str(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_page_key_ignores_query() {
        let a = normalize_url("https://example.com/list?page=1").unwrap();
        let b = normalize_url("https://example.com/list?page=2").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.page_key(), b.page_key());
        assert_eq!(a.page_key(), "https://example.com/list");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_resolve_relative() {
        let url = resolve_url("../img/logo.png", &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/blog/img/logo.png");

        let url = resolve_url("//cdn.example.net/a.js", &base()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.net/a.js");
    }

    #[test]
    fn test_classify_pseudo_schemes() {
        let b = base();
        assert_eq!(
            classify_url("javascript:void(0)", &b).unwrap(),
            UrlClass::JavascriptPseudo
        );
        assert_eq!(
            classify_url("  JavaScript:alert(1)", &b).unwrap(),
            UrlClass::JavascriptPseudo
        );
        assert_eq!(classify_url("mailto:a@b.c", &b).unwrap(), UrlClass::Mailto);
        assert_eq!(classify_url("tel:+6612345", &b).unwrap(), UrlClass::Tel);
        assert_eq!(
            classify_url("data:image/png;base64,AAAA", &b).unwrap(),
            UrlClass::Data
        );
        assert_eq!(
            classify_url("ftp://files.example.com/x", &b).unwrap(),
            UrlClass::OtherScheme("ftp".to_string())
        );
    }

    #[test]
    fn test_classify_anchor_only_keeps_fragment() {
        assert_eq!(
            classify_url("#top", &base()).unwrap(),
            UrlClass::AnchorOnly("top".to_string())
        );
        assert_eq!(
            classify_url("", &base()).unwrap(),
            UrlClass::AnchorOnly(String::new())
        );
    }

    #[test]
    fn test_classify_http() {
        let class = classify_url("/about/#team", &base()).unwrap();
        assert_eq!(
            class.as_http().map(|u| u.as_str()),
            Some("https://example.com/about")
        );
    }

    #[test]
    fn test_classify_malformed() {
        let result = classify_url("http://[::1", &base());
        assert!(matches!(result, Err(UrlError::Malformed(_))));
    }
}
