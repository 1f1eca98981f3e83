//! `.backup` siblings and restore

use super::{walk_files, RestoreReport};
use crate::output::OutputTree;
use crate::MirrorError;
use std::fs;
use std::path::{Path, PathBuf};

pub const BACKUP_SUFFIX: &str = ".backup";

/// A saved original next to the file it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub original: PathBuf,
    pub backup: PathBuf,
}

/// Copies `original` bytes to `<relative>.backup` unless a backup already exists
///
/// An existing backup always holds the oldest original, so it is never replaced.
/// Returns the record only when a new backup was written.
pub fn create_backup(
    output: &OutputTree,
    relative: &str,
    original: &[u8],
) -> Result<Option<BackupRecord>, MirrorError> {
    let backup_relative = format!("{}{}", relative, BACKUP_SUFFIX);
    if output.path_of(&backup_relative).exists() {
        tracing::debug!("Keeping existing backup {}", backup_relative);
        return Ok(None);
    }

    output.write(&backup_relative, original)?;
    Ok(Some(BackupRecord {
        original: output.path_of(relative),
        backup: output.path_of(&backup_relative),
    }))
}

/// Copies every backup under `root` over its original and deletes the backup
///
/// Running it again once no backups remain is a no-op.
pub fn restore(root: &Path) -> Result<RestoreReport, MirrorError> {
    let output = OutputTree::open(root)?;
    let mut report = RestoreReport::default();

    for backup_relative in walk_files(output.root())? {
        let Some(original_relative) = backup_relative.strip_suffix(BACKUP_SUFFIX) else {
            continue;
        };
        if original_relative.is_empty() || original_relative.ends_with('/') {
            continue;
        }

        match restore_one(&output, original_relative, &backup_relative) {
            Ok(record) => {
                tracing::info!("Restored {}", original_relative);
                report.restored.push(record);
            }
            Err(e) => {
                tracing::warn!("Failed to restore {}: {}", original_relative, e);
                report.errors.push((backup_relative.clone(), e.to_string()));
            }
        }
    }

    if report.backup_missing() {
        tracing::info!("No backups found under {}", output.root().display());
    }
    Ok(report)
}

fn restore_one(
    output: &OutputTree,
    original: &str,
    backup: &str,
) -> Result<BackupRecord, MirrorError> {
    let bytes = output.read(backup)?;
    output.write(original, &bytes)?;

    let backup_path = output.path_of(backup);
    fs::remove_file(&backup_path).map_err(|source| MirrorError::Filesystem {
        path: backup_path.clone(),
        source,
    })?;

    Ok(BackupRecord {
        original: output.path_of(original),
        backup: backup_path,
    })
}
