//! Terrain sampling on top of the index resolver and tile caches.

use crate::bounds::haversine_distance;
use crate::index::{DatasetType, IndexStatus, TileDescriptor};
use crate::mobility::{classify_vegetation_index, Mobility, VegetationClass};
use crate::resolver::{DatasetPaths, TileIndexResolver};
use crate::tile::RasterTile;
use crate::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tacmap_fetch::{
    ArchiveStore, BoundedCache, CacheConfig, CacheStats, FetchStats, HttpFetch, ReqwestFetcher,
    StorageClient,
};
use tacmap_metrics::{metric_defs, MetricLabels};
use tracing::{debug, warn};

/// Default number of decoded tiles kept in memory.
pub const DEFAULT_TILE_CAPACITY: usize = 32;

/// One sample of an elevation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfilePoint {
    /// Great-circle distance from the start, in metres.
    pub distance_m: f64,
    pub lat: f64,
    pub lon: f64,
    /// Interpolated elevation, `None` where no data is available.
    pub elevation: Option<f64>,
}

/// Cache and index statistics for status displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerStats {
    pub tiles: CacheStats,
    pub archives: CacheStats,
    pub fetch: FetchStats,
    pub loaded_regions: usize,
    pub elevation_index: IndexStatus,
    pub vegetation_index: IndexStatus,
}

/// Resolves, downloads, decodes and samples raster tiles.
///
/// Concurrent requests for the same uncached tile are not deduplicated; both
/// may download it, and later requests hit the cache.
pub struct TerrainSampler<H = ReqwestFetcher> {
    resolver: TileIndexResolver<H>,
    archives: ArchiveStore<H>,
    tiles: Mutex<BoundedCache<String, Arc<RasterTile>>>,
}

impl<H: HttpFetch> TerrainSampler<H> {
    pub fn new(
        client: Arc<StorageClient<H>>,
        paths: DatasetPaths,
        tile_cache: CacheConfig,
        archive_cache: CacheConfig,
    ) -> Self {
        Self {
            resolver: TileIndexResolver::new(client.clone(), paths),
            archives: ArchiveStore::new(client, archive_cache),
            tiles: Mutex::new(BoundedCache::new("tile", tile_cache)),
        }
    }

    pub fn resolver(&self) -> &TileIndexResolver<H> {
        &self.resolver
    }

    pub fn archives(&self) -> &ArchiveStore<H> {
        &self.archives
    }

    /// Download and decode the tile behind a descriptor, or return it from cache.
    pub async fn load_tile(&self, descriptor: &TileDescriptor) -> Result<Arc<RasterTile>> {
        let key = descriptor.cache_key();
        let cached = self.tiles.lock().get(&key);
        if let Some(tile) = cached {
            return Ok(tile);
        }

        let dataset = descriptor.dataset;
        let paths = self.resolver.paths();
        let bytes = match &descriptor.source_archive {
            Some(archive) => {
                let archive_path = paths.resolve(dataset, archive);
                self.archives
                    .extract(&archive_path, &descriptor.entry_name)
                    .await?
            }
            None => {
                let path = paths.resolve(dataset, descriptor.storage_path());
                self.resolver.client().fetch(&path).await?
            }
        };

        let bounds = descriptor.bounds;
        let scale_factor = descriptor.scale_factor;
        let tile = tokio::task::spawn_blocking(move || {
            RasterTile::from_tiff_bytes(&bytes, bounds).map(|t| t.with_scale_factor(scale_factor))
        })
        .await??;

        metrics::counter!(
            metric_defs::TILE_DECODES.name,
            &MetricLabels::new(dataset.as_label()).to_labels()
        )
        .increment(1);
        let (width, height) = tile.dimensions();
        debug!(dataset = %dataset, tile = %descriptor.key, width, height, "decoded tile");

        let tile = Arc::new(tile);
        self.tiles.lock().insert(key, tile.clone());
        Ok(tile)
    }

    /// Decoded tile covering a coordinate; `None` when no tile covers it.
    pub async fn tile_at(
        &self,
        dataset: DatasetType,
        lat: f64,
        lon: f64,
    ) -> Result<Option<Arc<RasterTile>>> {
        match self.resolver.resolve_tile(dataset, lat, lon).await {
            Some(descriptor) => Ok(Some(self.load_tile(&descriptor).await?)),
            None => Ok(None),
        }
    }

    /// Physical value at a coordinate, nearest pixel.
    pub async fn sample_value(&self, dataset: DatasetType, lat: f64, lon: f64) -> Result<Option<f64>> {
        Ok(self
            .tile_at(dataset, lat, lon)
            .await?
            .and_then(|tile| tile.sample_value(lat, lon)))
    }

    /// Bilinearly interpolated elevation in metres.
    pub async fn elevation(&self, lat: f64, lon: f64) -> Result<Option<f64>> {
        Ok(self
            .tile_at(DatasetType::Elevation, lat, lon)
            .await?
            .and_then(|tile| tile.sample_bilinear(lat, lon)))
    }

    /// Sample many `(lat, lon)` points, each resolved independently.
    ///
    /// Output order matches the input. A point that fails resolves to `None`
    /// without affecting the others.
    pub async fn sample_batch(&self, dataset: DatasetType, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        let mut values = Vec::with_capacity(points.len());
        for &(lat, lon) in points {
            let value = match self.sample_value(dataset, lat, lon).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(dataset = %dataset, lat, lon, error = %e, "sample failed");
                    None
                }
            };
            values.push(value);
        }
        values
    }

    /// Sample elevations at `num_samples` evenly spaced points from `start`
    /// to `end` (both `(lat, lon)`, both included).
    ///
    /// May load several tiles when the line crosses tile boundaries.
    pub async fn sample_line(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        num_samples: usize,
    ) -> Vec<ProfilePoint> {
        let total_distance = haversine_distance(start.0, start.1, end.0, end.1);
        let mut profile = Vec::with_capacity(num_samples);

        for i in 0..num_samples {
            let t = if num_samples > 1 {
                i as f64 / (num_samples - 1) as f64
            } else {
                0.0
            };
            let lat = start.0 + t * (end.0 - start.0);
            let lon = start.1 + t * (end.1 - start.1);

            let elevation = match self.elevation(lat, lon).await {
                Ok(elevation) => elevation,
                Err(e) => {
                    warn!(dataset = "elevation", lat, lon, error = %e, "profile sample failed");
                    None
                }
            };

            profile.push(ProfilePoint {
                distance_m: t * total_distance,
                lat,
                lon,
                elevation,
            });
        }

        profile
    }

    /// Terrain slope in percent from the elevation dataset.
    pub async fn slope_percent(&self, lat: f64, lon: f64) -> Result<Option<f64>> {
        Ok(self
            .tile_at(DatasetType::Elevation, lat, lon)
            .await?
            .and_then(|tile| tile.slope_percent(lat, lon)))
    }

    /// Vegetation class from the scaled vegetation index.
    pub async fn vegetation_class(&self, lat: f64, lon: f64) -> Result<Option<VegetationClass>> {
        Ok(self
            .sample_value(DatasetType::Vegetation, lat, lon)
            .await?
            .map(classify_vegetation_index))
    }

    /// Mobility at a coordinate; `None` unless both datasets cover it.
    pub async fn mobility_at(&self, lat: f64, lon: f64) -> Result<Option<Mobility>> {
        let Some(vegetation) = self.vegetation_class(lat, lon).await? else {
            return Ok(None);
        };
        let Some(slope) = self.slope_percent(lat, lon).await? else {
            return Ok(None);
        };
        Ok(Some(Mobility::new(vegetation, slope)))
    }

    pub fn stats(&self) -> SamplerStats {
        SamplerStats {
            tiles: self.tiles.lock().stats(),
            archives: self.archives.cache_stats(),
            fetch: self.resolver.client().stats(),
            loaded_regions: self.resolver.loaded_region_count(),
            elevation_index: self.resolver.index_status(DatasetType::Elevation),
            vegetation_index: self.resolver.index_status(DatasetType::Vegetation),
        }
    }

    /// Drop every cached index, archive and tile.
    pub fn clear_cache(&self) {
        self.resolver.clear_cache();
        self.archives.clear();
        self.tiles.lock().clear();
    }
}
