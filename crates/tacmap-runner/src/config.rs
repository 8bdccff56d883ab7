//! Pipeline configuration file.
//!
//! ```yaml
//! storage:
//!   cdn_base: https://cdn.example.org/gh/org/terrain-data@main
//!   origin_base: https://github.com/org/terrain-data/releases/download/v1
//!   local_dir: ./public/data
//!   site_url: https://planner.example.org/data
//!   host: planner.example.org
//!   timeout_secs: 60
//! cache:
//!   tile_capacity: 32
//!   tile_ttl_secs: 3600
//!   archive_capacity: 8
//! datasets:
//!   elevation: elevation/master_index.json
//!   vegetation: vegetation/master_index.json
//! classification:
//!   stride: 4
//!   grid_cell_size: 32.0
//! ```
//!
//! Every section and field is optional.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tacmap_classify::AnalysisConfig;
use tacmap_dem::{DatasetPaths, DEFAULT_TILE_CAPACITY};
use tacmap_fetch::{CacheConfig, SourceConfig, DEFAULT_ARCHIVE_CAPACITY};

/// Storage backends and transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    #[serde(flatten)]
    pub sources: SourceConfig,
    /// Per-request timeout enforced by the HTTP transport.
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            sources: SourceConfig::default(),
            timeout_secs: tacmap_fetch::http::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl StorageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Capacities and expiry of the tile and archive caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub tile_capacity: usize,
    /// Absent means tiles never expire.
    pub tile_ttl_secs: Option<u64>,
    pub archive_capacity: usize,
    /// Absent means archives never expire.
    pub archive_ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            tile_capacity: DEFAULT_TILE_CAPACITY,
            tile_ttl_secs: None,
            archive_capacity: DEFAULT_ARCHIVE_CAPACITY,
            archive_ttl_secs: None,
        }
    }
}

impl CacheSettings {
    pub fn tile_cache(&self) -> CacheConfig {
        cache_config(self.tile_capacity, self.tile_ttl_secs)
    }

    pub fn archive_cache(&self) -> CacheConfig {
        cache_config(self.archive_capacity, self.archive_ttl_secs)
    }
}

fn cache_config(capacity: usize, ttl_secs: Option<u64>) -> CacheConfig {
    let config = CacheConfig::new(capacity);
    match ttl_secs {
        Some(secs) => config.with_ttl(Duration::from_secs(secs)),
        None => config,
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub datasets: DatasetPaths,
    pub classification: AnalysisConfig,
}

impl PipelineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.timeout_secs == 0 {
            return Err(ConfigError::Invalid("storage.timeout_secs must be positive".into()));
        }
        self.classification
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("classification: {e}")))
    }
}
