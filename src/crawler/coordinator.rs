//! Mirror coordinator - main crawl orchestration logic
//!
//! This module contains the main page loop that coordinates all aspects of
//! mirroring, including:
//! - Seeding the frontier from URLs or a local HTML file
//! - Fetching pages and enqueuing their links breadth-first
//! - Materializing each page's assets through the registry
//! - Rewriting and writing pages
//! - Consolidation, the sitemap and the final report

use crate::assets::{AssetRegistry, FontPolicy};
use crate::config::Config;
use crate::consolidate::{
    consolidate, BundleKind, ConsolidationPlan, SCRIPT_BUNDLE, STYLESHEET_BUNDLE,
};
use crate::crawler::extractor::{extract_html, RefKind};
use crate::crawler::fetcher::{Fetched, Fetcher};
use crate::crawler::frontier::{Admission, Frontier, PageRecord};
use crate::document::{detect_base_url, page_title, HtmlDocument};
use crate::output::{write_sitemap, CrawlReport, OutputTree, SitemapEntry, SITEMAP_FILE};
use crate::rewrite::{rewrite_html, RewriteContext};
use crate::state::PageState;
use crate::url::{normalize_url, CanonicalUrl, HostScope};
use crate::{ConfigError, MirrorError};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// The HTML of `local-file`, served in place of fetching its URL
struct LocalSeed {
    url: CanonicalUrl,
    base: Url,
    html: String,
}

/// Main mirror coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    registry: AssetRegistry,
    frontier: Frontier,
    output: OutputTree,
    font_policy: FontPolicy,
    plan: Option<ConsolidationPlan>,
    local_seed: Option<LocalSeed>,
    stop: Arc<AtomicBool>,
}

impl Coordinator {
    /// Creates a coordinator and the output tree
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(MirrorError)` - The output directory is unusable, a seed is invalid,
    ///   or the local file cannot be read
    pub fn new(config: Config) -> Result<Self, MirrorError> {
        let output = OutputTree::create(&config.output.directory)?;

        let local_seed = match &config.crawl.local_file {
            Some(path) => Some(load_local_seed(path, config.crawl.base_url.as_deref())?),
            None => None,
        };

        let mut seeds = Vec::new();
        if let Some(local) = &local_seed {
            seeds.push(local.url.clone());
        }
        for seed in &config.crawl.seeds {
            seeds.push(normalize_url(seed)?);
        }

        let fetcher = Arc::new(Fetcher::new(&config)?);
        let font_policy = FontPolicy::from_config(&config.assets);
        let registry = AssetRegistry::new(
            Arc::clone(&fetcher),
            output.clone(),
            font_policy.clone(),
            config.crawl.max_concurrent_fetches,
        );

        let plan = config.assets.consolidate.then(ConsolidationPlan::new);
        if plan.is_some() {
            registry.reserve_name(STYLESHEET_BUNDLE);
            registry.reserve_name(SCRIPT_BUNDLE);
        }
        if config.output.sitemap {
            registry.reserve_name(SITEMAP_FILE);
        }

        let scope = HostScope::new(&seeds, &config.crawl);
        let mut frontier = Frontier::new(scope, &config.crawl, registry.names());
        for seed in &seeds {
            frontier.seed(seed.clone());
        }
        tracing::info!("Seeded frontier with {} page(s)", frontier.admitted());

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            registry,
            frontier,
            output,
            font_policy,
            plan,
            local_seed,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops the run after the page in progress
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Runs the page loop until the frontier drains or a stop is requested
    ///
    /// Per-page and per-asset failures are recorded in the report and never abort
    /// the run.
    pub async fn run(mut self) -> Result<CrawlReport, MirrorError> {
        let started_at = Utc::now();
        let start_time = std::time::Instant::now();
        tracing::info!(
            "Starting mirror into {}",
            self.config.output.directory.display()
        );

        let mut pages_processed = 0usize;
        let mut interrupted = false;

        loop {
            if self.stop.load(Ordering::SeqCst) {
                interrupted = true;
                tracing::warn!(
                    "Stop requested, {} queued page(s) left unfetched",
                    self.frontier.pending()
                );
                break;
            }

            let Some(page) = self.frontier.next() else {
                tracing::info!("Frontier is empty, mirror complete");
                break;
            };

            tracing::debug!("Processing page {} (depth {})", page.url, page.depth);
            let outcome = self.process_page(&page).await;
            if let Err(reason) = &outcome {
                tracing::warn!("Page {} failed: {}", page.url, reason);
            }
            self.frontier.complete(&page.url, outcome)?;

            pages_processed += 1;
            if pages_processed % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages processed, {} in frontier, {:.2} pages/sec",
                    pages_processed,
                    self.frontier.pending(),
                    pages_processed as f64 / start_time.elapsed().as_secs_f64()
                );
            }
        }

        let report = self.finish(started_at, interrupted);
        tracing::info!(
            "Mirror completed: {} pages, {} assets in {:?}",
            report.pages_fetched,
            report.assets.resolved,
            start_time.elapsed()
        );
        Ok(report)
    }

    /// Fetches, materializes and writes one page; returns its title
    async fn process_page(&mut self, page: &PageRecord) -> Result<Option<String>, String> {
        let fetched = match self.local_html(&page.url) {
            Some(fetched) => fetched,
            None => self
                .fetcher
                .fetch_page(&page.url)
                .await
                .map_err(|e| e.to_string())?,
        };

        if !fetched.is_html() {
            tracing::debug!("{} is not HTML, stored as-is", page.url);
            self.output
                .write(&page.local_path, &fetched.bytes)
                .map_err(|e| e.to_string())?;
            return Ok(None);
        }

        let doc = HtmlDocument::parse(fetched.bytes).map_err(|e| e.to_string())?;
        let base = doc
            .base_href()
            .and_then(|(_, href)| fetched.final_url.join(href).ok())
            .unwrap_or_else(|| fetched.final_url.clone());
        let refs = extract_html(&doc, &base, &self.font_policy);

        for reference in refs.iter().filter(|r| r.kind == RefKind::Anchor) {
            match self.frontier.offer(reference.url.clone(), page.depth + 1) {
                Admission::Enqueued => tracing::debug!("Enqueued {}", reference.url),
                Admission::DepthExceeded => {
                    tracing::trace!("Depth limit reached for {}", reference.url)
                }
                Admission::PageLimitReached => {
                    tracing::trace!("Page limit reached, skipping {}", reference.url)
                }
                Admission::AlreadyKnown | Admission::OutOfScope => {}
            }
        }

        if let Some(plan) = self.plan.as_mut() {
            for reference in refs
                .iter()
                .filter(|r| r.is_bundle_candidate() && !r.keep_external)
            {
                let kind = match reference.kind {
                    RefKind::Stylesheet => BundleKind::Stylesheet,
                    _ => BundleKind::Script,
                };
                plan.note(kind, &reference.url);
            }
        }

        let resolutions = self.registry.resolve_references(&refs, &page.url).await;

        let routing = self.plan.as_ref().map(|_| ConsolidationPlan::routing());
        let ctx = RewriteContext {
            document_path: &page.local_path,
            assets: &resolutions,
            pages: &self.frontier,
            bundles: routing.as_ref(),
        };
        let rewritten = rewrite_html(&doc, &refs, &ctx).map_err(|e| e.to_string())?;

        self.output
            .write(&page.local_path, &rewritten)
            .map_err(|e| e.to_string())?;

        Ok(page_title(&doc.text()))
    }

    /// The local file's contents when `url` is the local seed
    fn local_html(&self, url: &CanonicalUrl) -> Option<Fetched> {
        let seed = self
            .local_seed
            .as_ref()
            .filter(|seed| seed.url.page_key() == url.page_key())?;

        Some(Fetched {
            final_url: seed.base.clone(),
            content_type: Some("text/html".to_string()),
            bytes: seed.html.clone().into_bytes(),
        })
    }

    /// Consolidation, the sitemap and the report
    fn finish(&self, started_at: chrono::DateTime<Utc>, interrupted: bool) -> CrawlReport {
        let mut errors = Vec::new();

        let bundles = match &self.plan {
            Some(plan) => {
                match consolidate(plan, |url| self.registry.resolution(url), &self.output) {
                    Ok(bundles) => bundles,
                    Err(e) => {
                        tracing::error!("Consolidation failed: {}", e);
                        errors.push(format!("consolidation failed: {}", e));
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        if self.config.output.sitemap {
            let entries: Vec<SitemapEntry> = self
                .frontier
                .records()
                .filter(|record| record.state == PageState::Fetched)
                .map(|record| SitemapEntry {
                    url: record.url.to_string(),
                    local_path: record.local_path.clone(),
                    title: record.title.clone(),
                })
                .collect();

            if let Err(e) = write_sitemap(&self.output, &entries) {
                tracing::error!("Failed to write sitemap: {}", e);
                errors.push(format!("sitemap: {}", e));
            }
        }

        let pages_fetched = self
            .frontier
            .records()
            .filter(|record| record.state == PageState::Fetched)
            .count();
        let pages_failed = self
            .frontier
            .records()
            .filter(|record| record.state == PageState::Failed)
            .map(|record| {
                (
                    record.url.to_string(),
                    record.failure.clone().unwrap_or_default(),
                )
            })
            .collect();

        CrawlReport {
            started_at,
            finished_at: Utc::now(),
            output_dir: self.output.root().to_path_buf(),
            interrupted,
            pages_fetched,
            pages_failed,
            pages_unfetched: self.frontier.pending(),
            assets: self.registry.stats(),
            external_links: self.frontier.external_links().iter().cloned().collect(),
            bundles,
            errors,
        }
    }
}

/// Reads `local-file` and decides the URL it stands for
fn load_local_seed(path: &Path, base_url: Option<&str>) -> Result<LocalSeed, MirrorError> {
    let html = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Validation(format!("Cannot read local-file {}: {}", path.display(), e))
    })?;

    let base = match base_url {
        Some(base) => Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", base, e)))?,
        None => detect_base_url(&html).ok_or_else(|| {
            ConfigError::Validation(format!(
                "Cannot determine the original URL of {}; set base-url",
                path.display()
            ))
        })?,
    };
    let url = normalize_url(base.as_str())?;
    tracing::info!("Mirroring local file {} as {}", path.display(), url);

    Ok(LocalSeed { url, base, html })
}

/// Runs a complete mirror operation
///
/// # Example
///
/// ```no_run
/// use sumi_mirror::config::load_config;
/// use sumi_mirror::crawler::mirror;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("mirror.toml"))?;
/// let report = mirror(config).await?;
/// println!("{} pages", report.pages_fetched);
/// # Ok(())
/// # }
/// ```
pub async fn mirror(config: Config) -> Result<CrawlReport, MirrorError> {
    Coordinator::new(config)?.run().await
}
