//! Output module for the materialized tree and run reports
//!
//! This module handles:
//! - Creating the output directory layout and writing files atomically
//! - Rendering the end-of-run crawl report
//! - Writing the optional `sitemap.html` index

mod report;
mod sitemap;

pub use report::{format_report, print_report, CrawlReport};
pub use sitemap::{render_sitemap, write_sitemap, SitemapEntry, SITEMAP_FILE};

use crate::assets::{AssetKind, LocalPath};
use crate::MirrorError;
use std::fs;
use std::path::{Path, PathBuf};

/// Root of a materialized mirror
///
/// Pages live under their URL-derived paths and assets under `css/`, `js/`,
/// `images/`, `fonts/` and `other/`. Every write goes to a temporary sibling first
/// and is renamed into place, so a file is either absent or complete.
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    /// Creates the directory layout under `root` and checks that it is writable
    ///
    /// Failure here is the one filesystem error that aborts a run.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let root = root.into();

        let dirs = std::iter::once(root.clone())
            .chain(AssetKind::all().into_iter().map(|kind| root.join(kind.subdir())));
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|source| MirrorError::Filesystem {
                path: dir.clone(),
                source,
            })?;
        }

        let marker = root.join(".sumi-mirror-write-check");
        fs::write(&marker, b"")
            .and_then(|_| fs::remove_file(&marker))
            .map_err(|source| MirrorError::Filesystem {
                path: root.clone(),
                source,
            })?;

        Ok(Self { root })
    }

    /// Opens an existing directory without laying out the asset subdirectories
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let root = root.into();
        let metadata = fs::metadata(&root).map_err(|source| MirrorError::Filesystem {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(MirrorError::Filesystem {
                path: root,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a root-relative `/`-separated path
    pub fn path_of(&self, relative: &str) -> PathBuf {
        LocalPath::new(relative).under(&self.root)
    }

    /// Writes `bytes` at `relative`, replacing any existing file
    pub fn write(&self, relative: &str, bytes: &[u8]) -> Result<(), MirrorError> {
        let path = self.path_of(relative);
        let filesystem = |source| MirrorError::Filesystem {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(filesystem)?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = path.with_file_name(format!(".{}.partial", file_name));

        fs::write(&temp, bytes).map_err(filesystem)?;
        fs::rename(&temp, &path).map_err(|source| {
            let _ = fs::remove_file(&temp);
            MirrorError::Filesystem {
                path: path.clone(),
                source,
            }
        })
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>, MirrorError> {
        let path = self.path_of(relative);
        fs::read(&path).map_err(|source| MirrorError::Filesystem { path, source })
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path_of(relative).is_file()
    }
}
