use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure for Sumi-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    pub output: OutputConfig,
}

/// Crawl scope and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Start URL, or a fixed list of URLs crawled at depth 0
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Local HTML file mirrored in place of fetching the first page
    #[serde(rename = "local-file", default)]
    pub local_file: Option<PathBuf>,

    /// Base URL for resolving references in `local-file`
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    /// Maximum number of pages ever enqueued
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<usize>,

    /// Maximum link depth from a seed page
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Only follow links to seed hosts and `allowed-domains`
    #[serde(rename = "same-domain-only", default = "default_true")]
    pub same_domain_only: bool,

    /// Extra host patterns (e.g. "*.example.com") treated as same-domain
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// Maximum number of asset fetches in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_concurrency")]
    pub max_concurrent_fetches: usize,
}

/// Headers attached to every request
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept")]
    pub accept: String,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    /// Cookies sent with every request (locale/geo simulation)
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,

    /// Arbitrary extra headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Asset materialization policy
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    /// Merge stylesheets and scripts into one bundle per type
    #[serde(default)]
    pub consolidate: bool,

    /// Leave web fonts on their CDN instead of downloading them
    #[serde(rename = "keep-external-fonts", default = "default_true")]
    pub keep_external_fonts: bool,

    /// Host patterns identifying web-font CDNs
    #[serde(rename = "font-hosts", default = "default_font_hosts")]
    pub font_hosts: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root of the materialized tree
    pub directory: PathBuf,

    /// Write sitemap.html listing every fetched page
    #[serde(default)]
    pub sitemap: bool,
}

impl Config {
    /// Builds a configuration with default request and asset sections
    pub fn new(crawl: CrawlConfig, directory: impl Into<PathBuf>) -> Self {
        Self {
            crawl,
            request: RequestConfig::default(),
            assets: AssetConfig::default(),
            output: OutputConfig {
                directory: directory.into(),
                sitemap: false,
            },
        }
    }
}

impl CrawlConfig {
    /// Builds a crawl section for the given seeds with default pacing and no bounds
    pub fn with_seeds(seeds: Vec<String>) -> Self {
        Self {
            seeds,
            local_file: None,
            base_url: None,
            max_pages: None,
            max_depth: None,
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            same_domain_only: true,
            allowed_domains: Vec::new(),
            max_concurrent_fetches: default_concurrency(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            cookies: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            consolidate: false,
            keep_external_fonts: true,
            font_hosts: default_font_hosts(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_delay_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    4
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
        .to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

fn default_font_hosts() -> Vec<String> {
    [
        "fonts.googleapis.com",
        "fonts.gstatic.com",
        "*.typekit.net",
        "fonts.bunny.net",
        "use.fontawesome.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
