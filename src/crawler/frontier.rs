//! Breadth-first page frontier
//!
//! This module handles:
//! - FIFO ordering of pages by discovery
//! - Page identity by canonical URL without query
//! - Scope, depth and page-count admission
//! - Local path assignment for every admitted page, from the same name table as
//!   assets so a page never lands on an asset's file

use crate::assets::SharedNames;
use crate::config::CrawlConfig;
use crate::rewrite::{page_local_path, PageLocator};
use crate::state::PageState;
use crate::url::{CanonicalUrl, HostScope};
use crate::MirrorError;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// A page admitted to the crawl
#[derive(Debug, Clone)]
pub struct PageRecord {
    /// URL as first discovered, query included
    pub url: CanonicalUrl,
    pub depth: u32,
    /// Path of the page's file relative to the output root
    pub local_path: String,
    pub state: PageState,
    pub title: Option<String>,
    pub failure: Option<String>,
}

/// Outcome of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Enqueued,
    AlreadyKnown,
    OutOfScope,
    DepthExceeded,
    PageLimitReached,
}

/// The queue of pages to fetch
///
/// `max-pages` bounds how many pages are ever admitted, so every admitted page is
/// eventually fetched unless the run is stopped.
#[derive(Debug)]
pub struct Frontier {
    scope: HostScope,
    max_pages: Option<usize>,
    max_depth: Option<u32>,
    queue: VecDeque<String>,
    pages: HashMap<String, PageRecord>,
    order: Vec<String>,
    names: SharedNames,
    external: BTreeSet<String>,
}

impl Frontier {
    pub fn new(scope: HostScope, config: &CrawlConfig, names: SharedNames) -> Self {
        Self {
            scope,
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            queue: VecDeque::new(),
            pages: HashMap::new(),
            order: Vec::new(),
            names,
            external: BTreeSet::new(),
        }
    }

    /// Admits a seed at depth 0; seeds are in scope by definition
    pub fn seed(&mut self, url: CanonicalUrl) -> Admission {
        if self.pages.contains_key(&url.page_key()) {
            return Admission::AlreadyKnown;
        }
        self.admit(url, 0)
    }

    /// Offers a link discovered on a page at `depth - 1`
    pub fn offer(&mut self, url: CanonicalUrl, depth: u32) -> Admission {
        let key = url.page_key();
        if self.pages.contains_key(&key) {
            return Admission::AlreadyKnown;
        }
        if !self.scope.should_crawl(url.host()) {
            self.external.insert(key);
            return Admission::OutOfScope;
        }
        if self.max_depth.is_some_and(|max| depth > max) {
            return Admission::DepthExceeded;
        }
        self.admit(url, depth)
    }

    fn admit(&mut self, url: CanonicalUrl, depth: u32) -> Admission {
        if self.max_pages.is_some_and(|max| self.pages.len() >= max) {
            return Admission::PageLimitReached;
        }

        let key = url.page_key();
        let local_path = self.unique_local_path(page_local_path(&url));
        tracing::debug!("Admitted {} at depth {} -> {}", url, depth, local_path);

        self.pages.insert(
            key.clone(),
            PageRecord {
                url,
                depth,
                local_path,
                state: PageState::Pending,
                title: None,
                failure: None,
            },
        );
        self.order.push(key.clone());
        self.queue.push_back(key);
        Admission::Enqueued
    }

    /// Distinct page keys can share a derived path (`/a` and `/a/index.html`),
    /// and a page path can match a file already given to an asset
    fn unique_local_path(&mut self, path: String) -> String {
        let mut names = self.names.lock();
        if names.try_claim(&path) {
            return path;
        }

        let (stem, ext) = path.rsplit_once('.').unwrap_or((path.as_str(), "html"));
        let mut n = 2u32;
        loop {
            let candidate = format!("{stem}-{n}.{ext}");
            if names.try_claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Next pending page in discovery order
    pub fn next(&mut self) -> Option<PageRecord> {
        let key = self.queue.pop_front()?;
        self.pages.get(&key).cloned()
    }

    /// Records the outcome of processing a page: its title, or the failure reason
    pub fn complete(
        &mut self,
        url: &CanonicalUrl,
        outcome: Result<Option<String>, String>,
    ) -> Result<(), MirrorError> {
        let key = url.page_key();
        let Some(record) = self.pages.get_mut(&key) else {
            return Ok(());
        };

        match outcome {
            Ok(title) => {
                record.state = record.state.transition(PageState::Fetched)?;
                record.title = title;
            }
            Err(reason) => {
                record.state = record.state.transition(PageState::Failed)?;
                record.failure = Some(reason);
            }
        }
        Ok(())
    }

    /// Every admitted page, in admission order
    pub fn records(&self) -> impl Iterator<Item = &PageRecord> {
        self.order.iter().filter_map(|key| self.pages.get(key))
    }

    pub fn admitted(&self) -> usize {
        self.pages.len()
    }

    /// Admitted pages not yet taken from the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Out-of-scope pages that were linked
    pub fn external_links(&self) -> &BTreeSet<String> {
        &self.external
    }
}

impl PageLocator for Frontier {
    fn local_path(&self, url: &CanonicalUrl) -> Option<String> {
        self.pages
            .get(&url.page_key())
            .filter(|record| record.state != PageState::Failed)
            .map(|record| record.local_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::normalize_url;

    fn frontier_with_names(
        max_pages: Option<usize>,
        max_depth: Option<u32>,
        names: SharedNames,
    ) -> Frontier {
        let mut config = CrawlConfig::with_seeds(vec!["https://example.com/".to_string()]);
        config.max_pages = max_pages;
        config.max_depth = max_depth;
        let seeds = vec![normalize_url("https://example.com/").unwrap()];
        Frontier::new(HostScope::new(&seeds, &config), &config, names)
    }

    fn frontier(max_pages: Option<usize>, max_depth: Option<u32>) -> Frontier {
        frontier_with_names(max_pages, max_depth, SharedNames::default())
    }

    fn url(s: &str) -> CanonicalUrl {
        normalize_url(s).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut f = frontier(None, None);
        f.seed(url("https://example.com/"));
        f.offer(url("https://example.com/b"), 1);
        f.offer(url("https://example.com/a"), 1);

        let order: Vec<String> = std::iter::from_fn(|| f.next())
            .map(|p| p.url.to_string())
            .collect();
        assert_eq!(
            order,
            vec![
                "https://example.com/",
                "https://example.com/b",
                "https://example.com/a"
            ]
        );
    }

    #[test]
    fn test_query_variants_are_one_page() {
        let mut f = frontier(None, None);
        assert_eq!(f.offer(url("https://example.com/list?page=1"), 1), Admission::Enqueued);
        assert_eq!(
            f.offer(url("https://example.com/list?page=2#x"), 1),
            Admission::AlreadyKnown
        );
        assert_eq!(f.admitted(), 1);
    }

    #[test]
    fn test_scope_and_external_links() {
        let mut f = frontier(None, None);
        assert_eq!(f.offer(url("https://other.net/x"), 1), Admission::OutOfScope);
        assert!(f.external_links().contains("https://other.net/x"));
    }

    #[test]
    fn test_depth_limit() {
        let mut f = frontier(None, Some(1));
        assert_eq!(f.offer(url("https://example.com/about"), 1), Admission::Enqueued);
        assert_eq!(
            f.offer(url("https://example.com/about/team"), 2),
            Admission::DepthExceeded
        );
    }

    #[test]
    fn test_page_limit_bounds_admission() {
        let mut f = frontier(Some(2), None);
        f.seed(url("https://example.com/"));
        assert_eq!(f.offer(url("https://example.com/a"), 1), Admission::Enqueued);
        assert_eq!(
            f.offer(url("https://example.com/b"), 1),
            Admission::PageLimitReached
        );
    }

    #[test]
    fn test_local_paths_made_unique() {
        let mut f = frontier(None, None);
        f.offer(url("https://example.com/a"), 1);
        f.offer(url("https://example.com/a/index.html"), 1);

        let paths: Vec<&str> = f.records().map(|r| r.local_path.as_str()).collect();
        assert_eq!(paths, vec!["a/index.html", "a/index-2.html"]);
    }

    #[test]
    fn test_page_never_takes_an_asset_path() {
        let names = SharedNames::default();
        names.lock().reserve("images/logo.png");
        let mut f = frontier_with_names(None, None, names.clone());

        f.offer(url("https://example.com/images/logo.png"), 1);
        f.offer(url("https://example.com/css/site.css"), 1);

        let paths: Vec<&str> = f.records().map(|r| r.local_path.as_str()).collect();
        assert_eq!(paths[0], "images/logo-2.png");

        // Later assets see the page's claim.
        assert!(!names.lock().try_claim(paths[1]));
    }

    #[test]
    fn test_complete_and_locate() {
        let mut f = frontier(None, None);
        let ok = url("https://example.com/ok");
        let bad = url("https://example.com/bad");
        f.offer(ok.clone(), 1);
        f.offer(bad.clone(), 1);

        f.complete(&ok, Ok(Some("OK".to_string()))).unwrap();
        f.complete(&bad, Err("HTTP status 500".to_string())).unwrap();

        assert_eq!(f.local_path(&ok), Some("ok/index.html".to_string()));
        assert_eq!(f.local_path(&bad), None);
        assert!(f.complete(&ok, Ok(None)).is_err());
    }
}
