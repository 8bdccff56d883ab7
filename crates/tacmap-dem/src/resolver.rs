//! Coordinate to tile resolution across master and region indices.

use crate::index::{DatasetType, IndexStatus, MasterIndex, PartitionSource, TileDescriptor, TileIndex};
use crate::{Result, TerrainError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tacmap_fetch::{HttpFetch, ReqwestFetcher, StorageClient};
use tacmap_metrics::{metric_defs, MetricLabels};
use tracing::{debug, warn};

/// Storage paths of each dataset's master index.
///
/// Paths listed inside index documents are relative to the directory
/// holding the master index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetPaths {
    pub elevation: String,
    pub vegetation: String,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            elevation: "elevation/master_index.json".to_string(),
            vegetation: "vegetation/master_index.json".to_string(),
        }
    }
}

impl DatasetPaths {
    /// Storage path of a dataset's master index.
    pub fn master_path(&self, dataset: DatasetType) -> &str {
        match dataset {
            DatasetType::Elevation => &self.elevation,
            DatasetType::Vegetation => &self.vegetation,
        }
    }

    /// Storage path of a document or tile referenced from an index.
    ///
    /// A leading `/` makes the path relative to the storage root instead.
    pub fn resolve(&self, dataset: DatasetType, relative: &str) -> String {
        if let Some(absolute) = relative.strip_prefix('/') {
            return absolute.to_string();
        }
        match self.master_path(dataset).rsplit_once('/') {
            Some((root, _)) => format!("{root}/{relative}"),
            None => relative.to_string(),
        }
    }
}

/// Resolves coordinates to tile descriptors.
///
/// Master and region indices are fetched once and kept until
/// [`clear_cache`](Self::clear_cache). Fetch failures are not cached: the
/// degraded empty document is used for that call only.
pub struct TileIndexResolver<H = ReqwestFetcher> {
    client: Arc<StorageClient<H>>,
    paths: DatasetPaths,
    masters: Mutex<HashMap<DatasetType, Arc<MasterIndex>>>,
    regions: Mutex<HashMap<(DatasetType, String), Arc<TileIndex>>>,
    /// Datasets whose last load fell back to the degraded document.
    fallbacks: Mutex<HashSet<DatasetType>>,
}

impl<H: HttpFetch> TileIndexResolver<H> {
    pub fn new(client: Arc<StorageClient<H>>, paths: DatasetPaths) -> Self {
        Self {
            client,
            paths,
            masters: Mutex::new(HashMap::new()),
            regions: Mutex::new(HashMap::new()),
            fallbacks: Mutex::new(HashSet::new()),
        }
    }

    pub fn client(&self) -> &Arc<StorageClient<H>> {
        &self.client
    }

    pub fn paths(&self) -> &DatasetPaths {
        &self.paths
    }

    /// Fetch and cache a dataset's master index.
    ///
    /// Fails with [`TerrainError::Network`] only when every storage source
    /// failed.
    pub async fn load_master_index(&self, dataset: DatasetType) -> Result<Arc<MasterIndex>> {
        let cached = self.masters.lock().get(&dataset).cloned();
        if let Some(master) = cached {
            return Ok(master);
        }

        let path = self.paths.master_path(dataset);
        let doc: serde_json::Value = self.client.fetch_json(path).await?;
        let master = Arc::new(MasterIndex::from_json(dataset, path, &doc)?);
        debug!(
            dataset = %dataset,
            path,
            partitions = master.partitions().len(),
            "loaded master index"
        );

        self.fallbacks.lock().remove(&dataset);
        let master = self
            .masters
            .lock()
            .entry(dataset)
            .or_insert(master)
            .clone();
        Ok(master)
    }

    /// Key of the partition covering the point, or of the partition whose
    /// centroid is nearest when none does.
    ///
    /// `Ok(None)` only when the master index lists no partitions.
    pub async fn resolve_region(
        &self,
        dataset: DatasetType,
        lat: f64,
        lon: f64,
    ) -> Result<Option<String>> {
        let master = self.load_master_index(dataset).await?;
        Ok(Self::region_of(&master, lat, lon))
    }

    /// Fetch and cache the tile index of one region.
    pub async fn load_region_index(
        &self,
        dataset: DatasetType,
        region_key: &str,
    ) -> Result<Arc<TileIndex>> {
        let cache_key = (dataset, region_key.to_string());
        let cached = self.regions.lock().get(&cache_key).cloned();
        if let Some(index) = cached {
            return Ok(index);
        }

        let master = self.load_master_index(dataset).await?;
        let partition = master
            .partition(region_key)
            .ok_or_else(|| TerrainError::UnknownRegion {
                dataset: dataset.as_label(),
                key: region_key.to_string(),
            })?;

        let index = match &partition.source {
            PartitionSource::Inline(index) => index.clone(),
            PartitionSource::Remote(relative) => {
                let path = self.paths.resolve(dataset, relative);
                let doc: serde_json::Value = self.client.fetch_json(&path).await?;
                let index = Arc::new(TileIndex::from_json(dataset, &path, &doc)?);
                debug!(
                    dataset = %dataset,
                    region = region_key,
                    path = %path,
                    tiles = index.len(),
                    "loaded region index"
                );
                index
            }
        };

        self.fallbacks.lock().remove(&dataset);
        let index = self
            .regions
            .lock()
            .entry(cache_key)
            .or_insert(index)
            .clone();
        Ok(index)
    }

    /// Tile covering the point, first in document order on shared edges.
    ///
    /// `None` means no data here, including when an index could not be
    /// fetched (the failure is logged and the degraded document used).
    pub async fn resolve_tile(
        &self,
        dataset: DatasetType,
        lat: f64,
        lon: f64,
    ) -> Option<TileDescriptor> {
        let master = match self.load_master_index(dataset).await {
            Ok(master) => master,
            Err(e) => {
                self.record_fallback(dataset, lat, lon, &e);
                Arc::new(MasterIndex::fallback(dataset))
            }
        };

        let region = Self::region_of(&master, lat, lon)?;
        let index = match self.load_region_index(dataset, &region).await {
            Ok(index) => index,
            Err(e) => {
                self.record_fallback(dataset, lat, lon, &e);
                Arc::new(TileIndex::fallback(dataset))
            }
        };

        match index.find(lat, lon) {
            Some(tile) => Some(tile.clone()),
            None => {
                metrics::counter!(
                    metric_defs::TILE_NO_DATA.name,
                    &MetricLabels::new(dataset.as_label()).to_labels()
                )
                .increment(1);
                debug!(dataset = %dataset, lat, lon, region = %region, "no tile covers coordinate");
                None
            }
        }
    }

    /// Whether the dataset's indices are loaded or degraded.
    pub fn index_status(&self, dataset: DatasetType) -> IndexStatus {
        if self.fallbacks.lock().contains(&dataset) {
            IndexStatus::Fallback
        } else if self.masters.lock().contains_key(&dataset) {
            IndexStatus::Loaded
        } else {
            IndexStatus::NotLoaded
        }
    }

    /// Region indices currently held, across datasets.
    pub fn loaded_region_count(&self) -> usize {
        self.regions.lock().len()
    }

    /// Drop every cached index.
    pub fn clear_cache(&self) {
        self.masters.lock().clear();
        self.regions.lock().clear();
        self.fallbacks.lock().clear();
    }

    fn region_of(master: &MasterIndex, lat: f64, lon: f64) -> Option<String> {
        let partition = master.resolve(lat, lon)?;
        if !partition.bounds.contains(lat, lon) {
            debug!(
                dataset = %master.dataset(),
                lat,
                lon,
                region = %partition.key,
                "coordinate outside every partition, using nearest"
            );
        }
        Some(partition.key.clone())
    }

    fn record_fallback(&self, dataset: DatasetType, lat: f64, lon: f64, error: &TerrainError) {
        self.fallbacks.lock().insert(dataset);
        metrics::counter!(
            metric_defs::INDEX_FALLBACKS.name,
            &MetricLabels::new(dataset.as_label()).to_labels()
        )
        .increment(1);
        warn!(
            dataset = %dataset,
            lat,
            lon,
            error = %error,
            "index unavailable, using empty fallback document"
        );
    }
}
