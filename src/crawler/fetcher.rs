//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the mirror, including:
//! - Building HTTP clients with the configured browser-like headers
//! - Per-host request pacing through a shared [`HostGate`]
//! - GET requests for pages and assets
//! - Error classification into [`FetchError`]

use crate::assets::AssetKind;
use crate::config::{Config, RequestConfig};
use crate::state::HostGate;
use crate::url::{host_with_port, CanonicalUrl};
use crate::{ConfigError, FetchError, MirrorError};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// A successful HTTP retrieval
#[derive(Debug, Clone)]
pub struct Fetched {
    /// URL after redirects; relative references resolve against this
    pub final_url: Url,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Response body
    pub bytes: Vec<u8>,
}

impl Fetched {
    /// Returns true if the response looks like an HTML document
    pub fn is_html(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => looks_like_html(&self.bytes),
        }
    }
}

/// Sniffs a body without a Content-Type header
pub fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let head = head.trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<head")
}

/// Builds an HTTP client sending the configured headers on every request
///
/// # Arguments
///
/// * `config` - The request header configuration
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```no_run
/// use sumi_mirror::config::RequestConfig;
/// use sumi_mirror::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&RequestConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &RequestConfig, timeout: Duration) -> Result<Client, MirrorError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, header_value(&config.accept)?);
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header_value(&config.accept_language)?,
    );

    if !config.cookies.is_empty() {
        let cookie = config
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert(header::COOKIE, header_value(&cookie)?);
    }

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::Validation(format!("Invalid header name '{}': {}", name, e))
        })?;
        headers.insert(name, header_value(value)?);
    }

    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

fn header_value(value: &str) -> Result<HeaderValue, MirrorError> {
    HeaderValue::from_str(value).map_err(|e| {
        ConfigError::Validation(format!("Invalid header value '{}': {}", value, e)).into()
    })
}

/// Paced HTTP access shared by the page loop and the asset registry
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    gate: HostGate,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, MirrorError> {
        let client = build_http_client(
            &config.request,
            Duration::from_secs(config.crawl.timeout_secs),
        )?;

        Ok(Self {
            client,
            gate: HostGate::new(Duration::from_millis(config.crawl.delay_ms)),
        })
    }

    /// Fetches a page with the default headers
    pub async fn fetch_page(&self, url: &CanonicalUrl) -> Result<Fetched, FetchError> {
        self.get(url, None, None).await
    }

    /// Fetches an asset, sending an Accept header for its kind and the referring page
    pub async fn fetch_asset(
        &self,
        url: &CanonicalUrl,
        kind: AssetKind,
        referer: &CanonicalUrl,
    ) -> Result<Fetched, FetchError> {
        self.get(url, Some(kind.accept_header()), Some(referer.as_str()))
            .await
    }

    /// Requests sent so far to `host`, given as `host[:port]`
    pub async fn request_count(&self, host: &str) -> u32 {
        self.gate.request_count(host).await
    }

    async fn get(
        &self,
        url: &CanonicalUrl,
        accept: Option<&str>,
        referer: Option<&str>,
    ) -> Result<Fetched, FetchError> {
        let host = host_with_port(url.as_url()).unwrap_or_else(|| url.host().to_string());
        self.gate.wait_turn(&host).await;
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url.as_str());
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }

        let response = request.send().await.map_err(classify_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response.bytes().await.map_err(classify_error)?;

        Ok(Fetched {
            final_url,
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Network(format!("connection failed: {}", e))
    } else {
        FetchError::Network(e.to_string())
    }
}
