use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Tracks request pacing for one host
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current run
    pub request_count: u32,

    /// Timestamp of the last request to this host
    pub last_request_time: Option<Instant>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a request may be sent at `now` given the minimum spacing
    pub fn can_request(&self, min_delay: Duration, now: Instant) -> bool {
        self.time_until_next_request(min_delay, now).is_none()
    }

    /// Records that a request was sent
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Returns None if a request can be made now, or the duration to wait otherwise
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }
}

/// Per-host timestamp gate
///
/// Every request to a host passes through [`HostGate::wait_turn`], which holds that
/// host's lock while sleeping out the remaining delay. Concurrent callers for the same
/// host therefore queue up and are released `delay` apart; different hosts never
/// block each other.
#[derive(Debug)]
pub struct HostGate {
    delay: Duration,
    hosts: Mutex<HashMap<String, Arc<tokio::sync::Mutex<HostState>>>>,
}

impl HostGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `host` is allowed and records it
    pub async fn wait_turn(&self, host: &str) {
        let slot = self.slot(host);
        let mut state = slot.lock().await;

        if let Some(wait) = state.time_until_next_request(self.delay, Instant::now()) {
            tracing::trace!("Pacing {} for {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }

        state.record_request(Instant::now());
    }

    /// Number of requests sent to `host` so far
    pub async fn request_count(&self, host: &str) -> u32 {
        let slot = self.slot(host);
        let state = slot.lock().await;
        state.request_count
    }

    fn slot(&self, host: &str) -> Arc<tokio::sync::Mutex<HostState>> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(HostState::new())))
            .clone()
    }
}
