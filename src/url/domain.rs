use url::Url;

/// Extracts the lowercase host from a URL, without port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_mirror::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Host plus explicit port, the key used for per-host request pacing
pub fn host_with_port(url: &Url) -> Option<String> {
    let host = extract_host(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
