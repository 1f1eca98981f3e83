//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageState`: lifecycle of a single page (pending, fetched, failed)
//! - `HostState` / `HostGate`: per-host request pacing

mod host_state;
mod page_state;

pub use host_state::{HostGate, HostState};
pub use page_state::PageState;
