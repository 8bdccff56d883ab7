//! Storage access for terrain data.
//!
//! This crate provides:
//! - An ordered, multi-source fetch client (CDN mirror, origin release,
//!   bundled copy) that remembers unreachable backends for the session
//! - Bounded in-memory caches with oldest-first eviction and optional TTL
//! - Extraction of named entries from uncompressed tar archives
//!
//! # Example
//!
//! ```no_run
//! use tacmap_fetch::{ReqwestFetcher, SourceConfig, StorageClient};
//!
//! # async fn run() -> tacmap_fetch::Result<()> {
//! let config = SourceConfig {
//!     cdn_base: Some("https://cdn.example.org/terrain".into()),
//!     host: "localhost".into(),
//!     ..Default::default()
//! };
//! let client = StorageClient::new(ReqwestFetcher::new()?, config.candidates());
//! let index: serde_json::Value = client.fetch_json("elevation/master_index.json").await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cache;
pub mod client;
pub mod error;
pub mod http;
pub mod source;
pub mod store;

pub use archive::{extract_entry, list_entries, EntryInfo};
pub use cache::{BoundedCache, CacheConfig, CacheEntry, CacheStats};
pub use client::{FetchStats, StorageClient};
pub use error::{ArchiveError, FetchError};
pub use http::{HttpFetch, ReqwestFetcher};
pub use source::{DeploymentHost, Location, Source, SourceConfig, SourceKind};
pub use store::{ArchiveStore, DEFAULT_ARCHIVE_CAPACITY};

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
