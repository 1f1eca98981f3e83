//! End-of-run crawl report

use crate::assets::RegistryStats;
use crate::consolidate::Bundle;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::path::PathBuf;

/// Everything a mirror run did, for the terminal summary
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_dir: PathBuf,

    /// The run was stopped before the frontier drained
    pub interrupted: bool,

    pub pages_fetched: usize,

    /// Pages that could not be fetched or written, with the reason
    pub pages_failed: Vec<(String, String)>,

    /// Admitted pages never fetched because the run stopped
    pub pages_unfetched: usize,

    pub assets: RegistryStats,

    /// Out-of-scope pages linked from the mirror
    pub external_links: Vec<String>,

    pub bundles: Vec<Bundle>,

    /// Finalization failures (bundles, sitemap)
    pub errors: Vec<String>,
}

impl CrawlReport {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Returns true if any page or asset failed
    pub fn has_failures(&self) -> bool {
        !self.pages_failed.is_empty()
            || !self.assets.unresolved.is_empty()
            || !self.assets.unrewritten.is_empty()
            || !self.errors.is_empty()
    }
}

/// Formats a crawl report for the terminal
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Mirror Report ===\n");
    let _ = writeln!(out, "Output: {}", report.output_dir.display());
    let _ = writeln!(
        out,
        "Started: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Duration: {} seconds", report.duration_seconds());
    if report.interrupted {
        let _ = writeln!(
            out,
            "Interrupted: {} admitted pages were not fetched",
            report.pages_unfetched
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages:");
    let _ = writeln!(out, "  Fetched: {}", report.pages_fetched);
    let _ = writeln!(out, "  Failed: {}", report.pages_failed.len());
    let _ = writeln!(out, "  External links: {}", report.external_links.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "Assets:");
    let _ = writeln!(out, "  Downloaded: {}", report.assets.resolved);
    let _ = writeln!(out, "  Bytes written: {}", report.assets.bytes_written);
    let _ = writeln!(out, "  Kept external: {}", report.assets.kept_external.len());
    let _ = writeln!(out, "  Unresolved: {}", report.assets.unresolved.len());
    let _ = writeln!(out);

    if !report.bundles.is_empty() {
        let _ = writeln!(out, "Bundles:");
        for bundle in &report.bundles {
            let _ = writeln!(
                out,
                "  {} ({} sources, {} bytes)",
                bundle.path,
                bundle.segments.len(),
                bundle.len
            );
        }
        let _ = writeln!(out);
    }

    if !report.pages_failed.is_empty() {
        let _ = writeln!(out, "Failed pages:");
        for (url, reason) in &report.pages_failed {
            let _ = writeln!(out, "  - {}: {}", url, reason);
        }
        let _ = writeln!(out);
    }

    if !report.assets.unresolved.is_empty() {
        let _ = writeln!(out, "Unresolved assets:");
        for (url, reason) in &report.assets.unresolved {
            let _ = writeln!(out, "  - {}: {}", url, reason);
        }
        let _ = writeln!(out);
    }

    if !report.assets.unrewritten.is_empty() {
        let _ = writeln!(out, "Stylesheets stored without local references:");
        for (url, reason) in &report.assets.unrewritten {
            let _ = writeln!(out, "  - {}: {}", url, reason);
        }
        let _ = writeln!(out);
    }

    if !report.errors.is_empty() {
        let _ = writeln!(out, "Errors:");
        for error in &report.errors {
            let _ = writeln!(out, "  - {}", error);
        }
        let _ = writeln!(out);
    }

    out
}

/// Prints a crawl report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
