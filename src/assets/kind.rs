use crate::url::CanonicalUrl;
use std::fmt;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "avif", "bmp",
];
const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "eot", "otf"];

/// Kind of a materialized asset; decides its output subdirectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Stylesheet,
    Script,
    Image,
    Font,
    Other,
}

impl AssetKind {
    /// Subdirectory of the output tree holding assets of this kind
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Stylesheet => "css",
            Self::Script => "js",
            Self::Image => "images",
            Self::Font => "fonts",
            Self::Other => "other",
        }
    }

    pub fn all() -> [AssetKind; 5] {
        [
            Self::Stylesheet,
            Self::Script,
            Self::Image,
            Self::Font,
            Self::Other,
        ]
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "css" => Some(Self::Stylesheet),
            "js" | "mjs" => Some(Self::Script),
            e if IMAGE_EXTENSIONS.contains(&e) => Some(Self::Image),
            e if FONT_EXTENSIONS.contains(&e) => Some(Self::Font),
            _ => None,
        }
    }

    /// Kind implied by the extension of the URL's last path segment
    pub fn from_url(url: &CanonicalUrl) -> Option<Self> {
        url_extension(url).and_then(|ext| Self::from_extension(&ext))
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = mime_of(content_type);
        if mime == "text/css" {
            Some(Self::Stylesheet)
        } else if mime.contains("javascript") || mime == "text/ecmascript" {
            Some(Self::Script)
        } else if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("font/")
            || mime.starts_with("application/font")
            || mime.starts_with("application/x-font")
            || mime == "application/vnd.ms-fontobject"
        {
            Some(Self::Font)
        } else {
            None
        }
    }

    /// Re-types an `Other` asset from its response content type
    pub fn refine(self, content_type: Option<&str>) -> Self {
        match (self, content_type.and_then(Self::from_content_type)) {
            (Self::Other, Some(kind)) => kind,
            (kind, _) => kind,
        }
    }

    /// Extension given to a file whose URL carries none
    pub fn default_extension(&self, content_type: Option<&str>) -> Option<&'static str> {
        match self {
            Self::Stylesheet => return Some("css"),
            Self::Script => return Some("js"),
            _ => {}
        }

        let mime = content_type.map(mime_of)?;
        let ext = match mime.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/svg+xml" => "svg",
            "image/webp" => "webp",
            "image/avif" => "avif",
            "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
            "font/woff2" => "woff2",
            "font/woff" | "application/font-woff" => "woff",
            "font/ttf" | "application/x-font-ttf" => "ttf",
            "font/otf" => "otf",
            "application/vnd.ms-fontobject" => "eot",
            _ => return None,
        };
        Some(ext)
    }

    /// Accept header sent when fetching an asset of this kind
    pub fn accept_header(&self) -> &'static str {
        match self {
            Self::Stylesheet => "text/css,*/*;q=0.1",
            Self::Script => "*/*",
            Self::Image => "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8",
            Self::Font => "font/woff2,font/woff,font/ttf,*/*;q=0.5",
            Self::Other => "*/*",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Other => "other",
        })
    }
}

/// Lowercased extension of the URL's last path segment
pub fn url_extension(url: &CanonicalUrl) -> Option<String> {
    let segment = url.as_url().path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn mime_of(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
