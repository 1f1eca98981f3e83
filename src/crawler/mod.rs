//! Crawler module for page fetching and mirroring
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching with per-host pacing
//! - Reference extraction from HTML and CSS
//! - The breadth-first page frontier
//! - Overall mirror coordination

mod coordinator;
pub mod extractor;
pub mod fetcher;
mod frontier;

pub use coordinator::{mirror, Coordinator};
pub use extractor::{extract_css, extract_html, RefKind, Reference, Site};
pub use fetcher::{build_http_client, Fetched, Fetcher};
pub use frontier::{Admission, Frontier, PageRecord};
