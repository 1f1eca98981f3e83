//! Asset identity, naming and the shared registry
//!
//! Every stylesheet, script, image and font a mirror needs is materialized through
//! the [`AssetRegistry`]: one fetch and one local file per canonical URL, no matter
//! how many pages or stylesheets reference it.

mod kind;
pub mod naming;
mod registry;

pub use kind::{url_extension, AssetKind};
pub use naming::{file_name_for, sanitize_segment, NameTable, SharedNames};
pub use registry::{AssetRegistry, RegistryStats};

use crate::config::AssetConfig;
use crate::url::{CanonicalUrl, HostPatterns};
use std::fmt;
use std::path::{Path, PathBuf};

/// Path of a materialized file relative to the output root, `/`-separated
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPath(String);

impl LocalPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute location of this file under `root`
    pub fn under(&self, root: &Path) -> PathBuf {
        self.0
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of asking the registry for an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Downloaded and written at this path
    Local(LocalPath),
    /// Deliberately left on its remote host (web fonts)
    KeptExternal,
    /// Could not be materialized; the reason is kept for the report
    Unresolved(String),
}

impl Resolution {
    pub fn local_path(&self) -> Option<&LocalPath> {
        match self {
            Self::Local(path) => Some(path),
            _ => None,
        }
    }
}

/// Decides which font and font-stylesheet URLs stay remote
#[derive(Debug, Clone)]
pub struct FontPolicy {
    enabled: bool,
    hosts: HostPatterns,
}

impl FontPolicy {
    pub fn from_config(config: &AssetConfig) -> Self {
        Self {
            enabled: config.keep_external_fonts,
            hosts: HostPatterns::new(&config.font_hosts),
        }
    }

    /// A policy that keeps nothing external
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            hosts: HostPatterns::default(),
        }
    }

    pub fn keeps_external(&self, url: &CanonicalUrl, kind: AssetKind) -> bool {
        self.enabled
            && matches!(kind, AssetKind::Font | AssetKind::Stylesheet)
            && self.hosts.matches(url.host())
    }
}
