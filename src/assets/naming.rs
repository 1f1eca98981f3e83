use super::kind::AssetKind;
use super::LocalPath;
use crate::url::CanonicalUrl;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

/// A build-tool content hash appended to a stem, e.g. `app_3f9a2c1d`
static HASH_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)_[0-9a-fA-F]{8,32}$").expect("hash suffix regex is valid")
});

/// Replaces every character outside `[A-Za-z0-9._~-]` with `_`
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Strips a trailing `_<hex>` build hash from a file stem
pub fn strip_hash_suffix(stem: &str) -> Option<&str> {
    HASH_SUFFIX
        .captures(stem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Splits `name` into stem and extension (extension without the dot)
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn join_extension(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Derives the base file name for an asset from its URL's last path segment
///
/// The segment is sanitized, and when it has no extension one is supplied from
/// the asset kind or the response content type.
pub fn file_name_for(url: &CanonicalUrl, kind: AssetKind, content_type: Option<&str>) -> String {
    let segment = url
        .as_url()
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("index");

    let name = sanitize_segment(segment);

    match split_extension(&name) {
        (_, Some(_)) => name,
        (stem, None) => join_extension(stem, kind.default_extension(content_type)),
    }
}

/// Assigns unique local paths to assets
///
/// Names are compared case-insensitively so a tree copied to a case-insensitive
/// filesystem never collides.
#[derive(Debug, Default)]
pub struct NameTable {
    taken: HashSet<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a path as used so no asset is ever named after it
    pub fn reserve(&mut self, path: &str) {
        self.taken.insert(path.to_ascii_lowercase());
    }

    /// Takes `path` if nothing holds it yet
    pub fn try_claim(&mut self, path: &str) -> bool {
        self.taken.insert(path.to_ascii_lowercase())
    }

    /// Picks the path for a newly fetched asset
    ///
    /// Candidates, in order: the name with any build hash stripped, the name as
    /// served, `stem_<hash8>.ext` from the content hash, then numbered variants of
    /// the latter.
    pub fn assign(&mut self, kind: AssetKind, file_name: &str, content_hash: &str) -> LocalPath {
        let (stem, ext) = split_extension(file_name);
        let short_hash = &content_hash[..content_hash.len().min(8)];

        let mut candidates = Vec::with_capacity(3);
        if let Some(stripped) = strip_hash_suffix(stem) {
            candidates.push(join_extension(stripped, ext));
        }
        candidates.push(file_name.to_string());
        candidates.push(join_extension(&format!("{stem}_{short_hash}"), ext));

        for candidate in candidates {
            if let Some(path) = self.claim(kind, &candidate) {
                return path;
            }
        }

        let mut n = 2u32;
        loop {
            let candidate = join_extension(&format!("{stem}_{short_hash}-{n}"), ext);
            if let Some(path) = self.claim(kind, &candidate) {
                return path;
            }
            n += 1;
        }
    }

    fn claim(&mut self, kind: AssetKind, name: &str) -> Option<LocalPath> {
        let path = format!("{}/{}", kind.subdir(), name);
        if self.taken.insert(path.to_ascii_lowercase()) {
            Some(LocalPath::new(path))
        } else {
            None
        }
    }
}

/// One [`NameTable`] shared by page and asset naming, so no two files ever share a path
#[derive(Debug, Clone, Default)]
pub struct SharedNames(Arc<Mutex<NameTable>>);

impl SharedNames {
    pub fn lock(&self) -> MutexGuard<'_, NameTable> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}
