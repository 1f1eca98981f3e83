//! Link fixer and restore reports

use super::{BackupRecord, LinkClass};
use std::collections::BTreeMap;
use std::fmt::Write;

/// One rewritten anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixEntry {
    /// File path relative to the scanned root
    pub file: String,
    pub original: String,
    pub replacement: String,
    pub class: LinkClass,
}

#[derive(Debug, Clone, Default)]
pub struct FixReport {
    /// Nothing was written
    pub dry_run: bool,
    pub files_scanned: usize,
    pub files_modified: usize,
    pub links_fixed: usize,
    /// Untouched anchors by class
    pub preserved: BTreeMap<LinkClass, usize>,
    pub entries: Vec<FixEntry>,
    pub backups: Vec<BackupRecord>,
    /// Files skipped because they could not be read or written
    pub errors: Vec<(String, String)>,
}

impl FixReport {
    pub fn links_preserved(&self) -> usize {
        self.preserved.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub restored: Vec<BackupRecord>,
    pub errors: Vec<(String, String)>,
}

impl RestoreReport {
    /// Nothing to restore: no backup was found
    pub fn backup_missing(&self) -> bool {
        self.restored.is_empty() && self.errors.is_empty()
    }
}

pub fn format_fix_report(report: &FixReport) -> String {
    let mut out = String::new();

    let title = if report.dry_run {
        "=== Link Fixer Report (dry run) ==="
    } else {
        "=== Link Fixer Report ==="
    };
    let _ = writeln!(out, "{}\n", title);

    for entry in &report.entries {
        let _ = writeln!(out, "{}", entry.file);
        let _ = writeln!(out, "  {} ({})", entry.original, entry.class);
        let _ = writeln!(out, "  -> {}", entry.replacement);
    }
    if !report.entries.is_empty() {
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Files scanned: {}", report.files_scanned);
    let _ = writeln!(out, "Files modified: {}", report.files_modified);
    let _ = writeln!(out, "Links fixed: {}", report.links_fixed);
    let _ = writeln!(out, "Links preserved: {}", report.links_preserved());
    for (class, count) in &report.preserved {
        let _ = writeln!(out, "  {}: {}", class, count);
    }
    let _ = writeln!(out, "Backups created: {}", report.backups.len());

    if !report.errors.is_empty() {
        let _ = writeln!(out, "\nErrors:");
        for (file, error) in &report.errors {
            let _ = writeln!(out, "  - {}: {}", file, error);
        }
    }

    out
}

pub fn print_fix_report(report: &FixReport) {
    print!("{}", format_fix_report(report));
}

pub fn format_restore_report(report: &RestoreReport) -> String {
    let mut out = String::new();

    if report.backup_missing() {
        let _ = writeln!(out, "No backups found, nothing to restore");
        return out;
    }

    for record in &report.restored {
        let _ = writeln!(out, "Restored {}", record.original.display());
    }
    let _ = writeln!(out, "\nRestored {} file(s)", report.restored.len());

    if !report.errors.is_empty() {
        let _ = writeln!(out, "\nErrors:");
        for (file, error) in &report.errors {
            let _ = writeln!(out, "  - {}: {}", file, error);
        }
    }

    out
}

pub fn print_restore_report(report: &RestoreReport) {
    print!("{}", format_restore_report(report));
}
