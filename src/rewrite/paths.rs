use crate::assets::sanitize_segment;
use crate::url::CanonicalUrl;

/// Extensions kept verbatim because the file is not a web page
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "csv", "json", "xml", "rss", "atom", "zip", "gz", "tar", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx", "odt", "epub", "mp3", "mp4", "webm", "ogg", "wav", "png", "jpg",
    "jpeg", "gif", "svg", "webp", "ico",
];

/// Local path of a page, relative to the output root
///
/// `/` maps to `index.html`, an extensionless path to `<path>/index.html`, and a
/// dynamic page such as `list.php` to `list.php.html`. The query string never takes
/// part, so every query variant of a page shares one file.
///
/// ```
/// use sumi_mirror::normalize_url;
/// use sumi_mirror::rewrite::page_local_path;
///
/// let url = normalize_url("https://example.com/about/team").unwrap();
/// assert_eq!(page_local_path(&url), "about/team/index.html");
/// ```
pub fn page_local_path(url: &CanonicalUrl) -> String {
    let mut segments: Vec<String> = url
        .as_url()
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize_segment)
        .collect();

    let Some(last) = segments.pop() else {
        return "index.html".to_string();
    };

    let ext = last
        .rsplit_once('.')
        .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => segments.push(last),
        Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext) => segments.push(last),
        Some(_) => segments.push(format!("{last}.html")),
        None => {
            segments.push(last);
            segments.push("index.html".to_string());
        }
    }

    segments.join("/")
}

/// Relative path from the file `from` to the file `to`, both relative to the output root
///
/// ```
/// use sumi_mirror::rewrite::relative_path;
///
/// assert_eq!(relative_path("about/team/index.html", "css/site.css"), "../../css/site.css");
/// assert_eq!(relative_path("index.html", "images/logo.png"), "images/logo.png");
/// ```
pub fn relative_path(from: &str, to: &str) -> String {
    let mut from_dirs: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    from_dirs.pop();

    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let Some((to_file, to_dirs)) = to_parts.split_last() else {
        return String::new();
    };

    let common = from_dirs
        .iter()
        .zip(to_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from_dirs.len() - common];
    parts.extend(&to_dirs[common..]);
    parts.push(*to_file);
    parts.join("/")
}

/// The inverse of [`relative_path`]: resolves `href` written in the file `from`
///
/// Query and fragment are dropped. Returns `None` for URLs with a scheme or host
/// and for paths that climb above the root.
pub fn resolve_relative(from: &str, href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let has_scheme = path
        .split_once(':')
        .is_some_and(|(scheme, _)| !scheme.contains('/'));
    if path.is_empty() || path.starts_with("//") || has_scheme {
        return None;
    }

    let mut parts: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        let mut dirs: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
        dirs.pop();
        dirs
    };

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            segment => parts.push(segment),
        }
    }

    (!parts.is_empty()).then(|| parts.join("/"))
}
