//! Cached archive downloads and entry extraction.

use crate::archive::{self, EntryInfo};
use crate::cache::{BoundedCache, CacheConfig, CacheStats};
use crate::client::StorageClient;
use crate::http::{HttpFetch, ReqwestFetcher};
use crate::Result;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tacmap_metrics::metric_defs;
use tracing::debug;

/// Default number of archives kept in memory.
pub const DEFAULT_ARCHIVE_CAPACITY: usize = 8;

/// Downloads archives through a [`StorageClient`] and keeps recent ones in
/// memory, keyed by logical path, so extracting several entries from the same
/// archive costs one download.
pub struct ArchiveStore<H = ReqwestFetcher> {
    client: Arc<StorageClient<H>>,
    cache: Mutex<BoundedCache<String, Bytes>>,
}

impl<H: HttpFetch> ArchiveStore<H> {
    /// Create a store sharing `client`.
    pub fn new(client: Arc<StorageClient<H>>, config: CacheConfig) -> Self {
        Self {
            client,
            cache: Mutex::new(BoundedCache::new("archive", config)),
        }
    }

    /// The underlying storage client.
    pub fn client(&self) -> &Arc<StorageClient<H>> {
        &self.client
    }

    /// Archive bytes for a logical path, downloading on a cache miss.
    pub async fn archive(&self, path: &str) -> Result<Bytes> {
        let key = path.to_string();
        let cached = self.cache.lock().get(&key);
        if let Some(bytes) = cached {
            return Ok(bytes);
        }

        debug!(path, "downloading archive");
        let bytes = self.client.fetch(path).await?;
        self.cache.lock().insert(key, bytes.clone());
        Ok(bytes)
    }

    /// Extract one entry from the archive at `archive_path`.
    ///
    /// The returned buffer shares memory with the cached archive.
    pub async fn extract(&self, archive_path: &str, entry: &str) -> Result<Bytes> {
        let buf = self.archive(archive_path).await?;
        let data = archive::extract_entry(&buf, entry)?;
        metrics::counter!(metric_defs::ARCHIVE_EXTRACTIONS.name).increment(1);
        debug!(archive = archive_path, entry, size = data.len(), "extracted entry");
        Ok(buf.slice_ref(data))
    }

    /// List the entries of the archive at `archive_path`.
    pub async fn entries(&self, archive_path: &str) -> Result<Vec<EntryInfo>> {
        let buf = self.archive(archive_path).await?;
        Ok(archive::list_entries(&buf)?)
    }

    /// Archive cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Drop every cached archive.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}
