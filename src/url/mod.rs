//! URL handling module for Sumi-Mirror
//!
//! This module provides URL normalization, reference classification, host
//! extraction, wildcard matching, and crawl-scope classification.

mod domain;
mod matcher;
mod normalize;

use crate::config::CrawlConfig;

pub use domain::{extract_host, host_with_port};
pub use matcher::{matches_wildcard, HostPatterns};
pub use normalize::{classify_url, normalize_url, resolve_url, CanonicalUrl, UrlClass};

/// How a host relates to the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClassification {
    /// Host of one of the seed URLs
    Seed,
    /// Host matching a configured allowed-domains pattern
    Allowed,
    /// Any other host
    Foreign,
}

/// Decides which hosts the frontier may enqueue pages from
#[derive(Debug, Clone)]
pub struct HostScope {
    seed_hosts: Vec<String>,
    allowed: HostPatterns,
    same_domain_only: bool,
}

impl HostScope {
    pub fn new(seeds: &[CanonicalUrl], config: &CrawlConfig) -> Self {
        let mut seed_hosts: Vec<String> = seeds.iter().map(|s| s.host().to_string()).collect();
        seed_hosts.sort();
        seed_hosts.dedup();

        Self {
            seed_hosts,
            allowed: HostPatterns::new(&config.allowed_domains),
            same_domain_only: config.same_domain_only,
        }
    }

    pub fn classify(&self, host: &str) -> HostClassification {
        if self.seed_hosts.iter().any(|h| h == host) {
            HostClassification::Seed
        } else if self.allowed.matches(host) {
            HostClassification::Allowed
        } else {
            HostClassification::Foreign
        }
    }

    /// Returns true if pages on `host` may be enqueued
    pub fn should_crawl(&self, host: &str) -> bool {
        !self.same_domain_only || self.classify(host) != HostClassification::Foreign
    }
}
