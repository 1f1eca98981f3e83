use super::naming::{file_name_for, SharedNames};
use super::{AssetKind, LocalPath, Resolution};
use crate::crawler::extractor::{extract_css, Reference};
use crate::crawler::fetcher::Fetcher;
use crate::output::OutputTree;
use crate::rewrite::rewrite_css;
use crate::url::CanonicalUrl;
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};
use url::Url;

type Slot = Arc<watch::Sender<Option<Resolution>>>;

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Assets written to the output tree
    pub resolved: usize,
    /// Bytes written across all assets
    pub bytes_written: u64,
    /// Assets that could not be materialized, with the reason
    pub unresolved: Vec<(String, String)>,
    /// Distinct URLs left on their remote host
    pub kept_external: BTreeSet<String>,
    /// Stylesheets kept as served because their rewritten copy could not be written
    pub unrewritten: Vec<(String, String)>,
}

/// The single owner of asset downloads
///
/// Each canonical URL gets one in-flight slot. The first caller fetches, names and
/// publishes the asset; every later or concurrent caller waits on the slot and
/// receives the same [`Resolution`]. A stylesheet's slot is published before its own
/// references are resolved, so `@import` cycles terminate.
pub struct AssetRegistry {
    fetcher: Arc<Fetcher>,
    output: OutputTree,
    limiter: Semaphore,
    slots: Mutex<HashMap<CanonicalUrl, Slot>>,
    names: SharedNames,
    stats: Mutex<RegistryStats>,
    font_policy: super::FontPolicy,
}

enum Claim {
    Owner(Slot),
    Waiter(watch::Receiver<Option<Resolution>>),
}

impl AssetRegistry {
    pub fn new(
        fetcher: Arc<Fetcher>,
        output: OutputTree,
        font_policy: super::FontPolicy,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            fetcher,
            output,
            limiter: Semaphore::new(max_concurrent_fetches.max(1)),
            slots: Mutex::new(HashMap::new()),
            names: SharedNames::default(),
            stats: Mutex::new(RegistryStats::default()),
            font_policy,
        }
    }

    /// Keeps `path` out of the pool of asset names
    pub fn reserve_name(&self, path: &str) {
        self.names.lock().reserve(path);
    }

    /// The name table assets are named from, for sharing with page naming
    pub fn names(&self) -> SharedNames {
        self.names.clone()
    }

    /// Resolves every asset reference in `refs`, one request per distinct URL
    ///
    /// References flagged to stay external are answered without a fetch. Returns
    /// the resolution of each distinct asset URL.
    pub async fn resolve_references(
        &self,
        refs: &[Reference],
        referer: &CanonicalUrl,
    ) -> HashMap<CanonicalUrl, Resolution> {
        let mut resolutions = HashMap::new();
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for reference in refs {
            let Some(kind) = reference.asset_kind() else {
                continue;
            };
            if !seen.insert(&reference.url) {
                continue;
            }
            if reference.keep_external {
                lock(&self.stats)
                    .kept_external
                    .insert(reference.url.to_string());
                resolutions.insert(reference.url.clone(), Resolution::KeptExternal);
                continue;
            }
            targets.push((&reference.url, kind));
        }

        let results = join_all(
            targets
                .iter()
                .map(|(url, kind)| self.resolve(url, *kind, referer)),
        )
        .await;

        resolutions.extend(
            targets
                .into_iter()
                .map(|(url, _)| url.clone())
                .zip(results),
        );
        resolutions
    }

    /// Resolves one asset, fetching it only if no other caller has
    pub fn resolve<'a>(
        &'a self,
        url: &'a CanonicalUrl,
        kind: AssetKind,
        referer: &'a CanonicalUrl,
    ) -> BoxFuture<'a, Resolution> {
        async move {
            let claim = {
                let mut slots = lock(&self.slots);
                match slots.get(url) {
                    Some(slot) => Claim::Waiter(slot.subscribe()),
                    None => {
                        let (sender, _) = watch::channel(None);
                        let slot = Arc::new(sender);
                        slots.insert(url.clone(), Arc::clone(&slot));
                        Claim::Owner(slot)
                    }
                }
            };

            match claim {
                Claim::Owner(slot) => self.materialize(url, kind, referer, &slot).await,
                Claim::Waiter(mut receiver) => {
                    let resolution = match receiver.wait_for(Option::is_some).await {
                        Ok(value) => value.clone(),
                        Err(_) => None,
                    };
                    resolution.unwrap_or_else(|| {
                        Resolution::Unresolved("asset resolution was abandoned".to_string())
                    })
                }
            }
        }
        .boxed()
    }

    /// Settled resolution of `url`, if it has been requested and published
    pub fn resolution(&self, url: &CanonicalUrl) -> Option<Resolution> {
        let slots = lock(&self.slots);
        let slot = slots.get(url)?;
        let value = slot.borrow().clone();
        value
    }

    pub fn output(&self) -> &OutputTree {
        &self.output
    }

    pub fn stats(&self) -> RegistryStats {
        lock(&self.stats).clone()
    }

    async fn materialize(
        &self,
        url: &CanonicalUrl,
        kind: AssetKind,
        referer: &CanonicalUrl,
        slot: &Slot,
    ) -> Resolution {
        let fetched = match self.limiter.acquire().await {
            Ok(_permit) => self.fetcher.fetch_asset(url, kind, referer).await,
            Err(_) => {
                return self.fail(url, slot, "fetch limiter closed".to_string());
            }
        };

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Asset {} unresolved: {}", url, e);
                return self.fail(url, slot, e.to_string());
            }
        };

        let kind = kind.refine(fetched.content_type.as_deref());
        let content_hash = hex::encode(Sha256::digest(&fetched.bytes));
        let file_name = file_name_for(url, kind, fetched.content_type.as_deref());
        let path = self.names.lock().assign(kind, &file_name, &content_hash);
        debug!("Asset {} -> {}", url, path);

        // The path is published only once a file backs it.
        if let Err(e) = self.output.write(path.as_str(), &fetched.bytes) {
            warn!("Failed to write asset {}: {}", path, e);
            return self.fail(url, slot, e.to_string());
        }
        slot.send_replace(Some(Resolution::Local(path.clone())));

        let mut written = fetched.bytes.len();
        if kind == AssetKind::Stylesheet {
            if let Some(rewritten) = self
                .rewrite_stylesheet(url, &fetched.final_url, &path, &fetched.bytes)
                .await
            {
                match self.output.write(path.as_str(), &rewritten) {
                    Ok(()) => written = rewritten.len(),
                    Err(e) => {
                        warn!("Stylesheet {} kept as served: {}", path, e);
                        lock(&self.stats)
                            .unrewritten
                            .push((url.to_string(), e.to_string()));
                    }
                }
            }
        }

        let mut stats = lock(&self.stats);
        stats.resolved += 1;
        stats.bytes_written += written as u64;
        Resolution::Local(path)
    }

    /// Materializes a stylesheet's own references and points them at local files
    ///
    /// Returns `None` when the stylesheet is stored as served.
    async fn rewrite_stylesheet(
        &self,
        url: &CanonicalUrl,
        base: &Url,
        path: &LocalPath,
        bytes: &[u8],
    ) -> Option<Vec<u8>> {
        let Ok(text) = std::str::from_utf8(bytes) else {
            debug!("Stylesheet {} is not UTF-8, stored unmodified", url);
            return None;
        };

        let refs = extract_css(text, base, &self.font_policy);
        if refs.is_empty() {
            return None;
        }

        let resolutions = self.resolve_references(&refs, url).await;
        let rewritten = rewrite_css(text, &refs, &resolutions, path.as_str());
        (rewritten != text).then(|| rewritten.into_bytes())
    }

    fn fail(&self, url: &CanonicalUrl, slot: &Slot, reason: String) -> Resolution {
        let resolution = Resolution::Unresolved(reason.clone());
        slot.send_replace(Some(resolution.clone()));
        lock(&self.stats)
            .unresolved
            .push((url.to_string(), reason));
        resolution
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
