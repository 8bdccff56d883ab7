//! Ordered multi-source fetch with per-session dead-backend memory.
//!
//! A request walks the configured candidates (CDN mirror, origin release,
//! bundled copy) and returns the first payload that both downloads and
//! decodes. A backend whose transport failed is demoted for later requests:
//! it is tried only after every live candidate, never skipped outright, and a
//! success revives it.

use crate::http::{HttpFetch, ReqwestFetcher};
use crate::source::{Location, Source, SourceConfig, SourceKind};
use crate::{FetchError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tacmap_metrics::metric_defs;
use tracing::{debug, warn};

/// Fetch statistics for this session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Logical resources requested.
    pub requests: u64,
    /// Individual candidate attempts that failed.
    pub candidate_failures: u64,
    /// Resources for which every candidate failed.
    pub exhausted: u64,
    /// Total bytes downloaded.
    pub bytes_downloaded: u64,
}

/// Storage fallback client.
pub struct StorageClient<H = ReqwestFetcher> {
    http: H,
    sources: Vec<Source>,
    /// Backends whose transport failed during this session.
    dead: Mutex<HashSet<SourceKind>>,
    requests: AtomicU64,
    candidate_failures: AtomicU64,
    exhausted: AtomicU64,
    bytes_downloaded: AtomicU64,
}

impl<H> std::fmt::Debug for StorageClient<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("sources", &self.sources)
            .field("dead", &*self.dead.lock())
            .finish()
    }
}

impl StorageClient<ReqwestFetcher> {
    /// Create a client over the network using the configured candidates.
    pub fn from_config(config: &SourceConfig, timeout: Duration) -> Result<Self> {
        Ok(Self::new(
            ReqwestFetcher::with_timeout(timeout)?,
            config.candidates(),
        ))
    }
}

impl<H: HttpFetch> StorageClient<H> {
    /// Create a client with an explicit transport and candidate list.
    pub fn new(http: H, sources: Vec<Source>) -> Self {
        Self {
            http,
            sources,
            dead: Mutex::new(HashSet::new()),
            requests: AtomicU64::new(0),
            candidate_failures: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
        }
    }

    /// Configured candidates in priority order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Backends currently considered dead.
    pub fn dead_backends(&self) -> Vec<SourceKind> {
        let mut dead: Vec<SourceKind> = self.dead.lock().iter().copied().collect();
        dead.sort();
        dead
    }

    /// Forget every dead-backend mark.
    pub fn reset_backends(&self) {
        self.dead.lock().clear();
    }

    /// Fetch statistics for this session.
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests: self.requests.load(Ordering::Relaxed),
            candidate_failures: self.candidate_failures.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    /// Fetch raw bytes for a logical path.
    pub async fn fetch(&self, path: &str) -> Result<Bytes> {
        self.fetch_with(path, Ok).await
    }

    /// Fetch and decode a JSON document. A candidate whose payload does not
    /// decode counts as failed and the next one is tried.
    pub async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch_with(path, |bytes| Ok(serde_json::from_slice(&bytes)?))
            .await
    }

    /// Fetch a logical path, returning the first candidate payload `decode` accepts.
    pub async fn fetch_with<T, F>(&self, path: &str, decode: F) -> Result<T>
    where
        F: Fn(Bytes) -> Result<T>,
    {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let mut attempted = Vec::new();

        for source in self.candidate_order() {
            let target = source.target(path);
            let label = source.kind.as_label();
            metrics::counter!(metric_defs::FETCH_ATTEMPTS.name, "source" => label).increment(1);
            debug!(source = label, target = %target, "fetching");

            let outcome = match self.fetch_from(source, path).await {
                Ok(bytes) => {
                    let len = bytes.len() as u64;
                    self.bytes_downloaded.fetch_add(len, Ordering::Relaxed);
                    metrics::counter!(metric_defs::FETCH_BYTES.name, "source" => label)
                        .increment(len);
                    self.revive(source.kind);
                    decode(bytes)
                }
                Err(e) => {
                    if e.is_transport() {
                        self.mark_dead(source.kind);
                    }
                    Err(e)
                }
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.candidate_failures.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(metric_defs::FETCH_FAILURES.name, "source" => label)
                        .increment(1);
                    debug!(source = label, target = %target, error = %e, "candidate failed");
                    attempted.push(format!("{label} {target}: {e}"));
                }
            }
        }

        self.exhausted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(metric_defs::FETCH_EXHAUSTED.name).increment(1);
        warn!(path, attempted = ?attempted, "every storage candidate failed");
        Err(FetchError::ResourceUnavailable {
            path: path.to_string(),
            attempted,
        })
    }

    /// Live candidates in configured order, then the dead ones.
    fn candidate_order(&self) -> Vec<&Source> {
        let dead = self.dead.lock();
        let (live, demoted): (Vec<&Source>, Vec<&Source>) = self
            .sources
            .iter()
            .partition(|s| !dead.contains(&s.kind));
        live.into_iter().chain(demoted).collect()
    }

    async fn fetch_from(&self, source: &Source, path: &str) -> Result<Bytes> {
        match &source.location {
            Location::Url(_) => self.http.get(&source.target(path)).await,
            Location::Directory(dir) => {
                let file = dir.join(path.trim_start_matches('/'));
                Ok(Bytes::from(tokio::fs::read(file).await?))
            }
        }
    }

    fn mark_dead(&self, kind: SourceKind) {
        if self.dead.lock().insert(kind) {
            warn!(source = kind.as_label(), "storage backend unreachable, demoting for this session");
        }
    }

    fn revive(&self, kind: SourceKind) {
        if self.dead.lock().remove(&kind) {
            debug!(source = kind.as_label(), "storage backend reachable again");
        }
    }
}
