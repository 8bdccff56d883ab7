//! Terrain queries backing the CLI commands.

use crate::config::PipelineConfig;
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tacmap_dem::{
    DatasetType, IndexStatus, Mobility, ProfilePoint, SamplerStats, TerrainSampler, TileDescriptor,
};
use tacmap_fetch::{HttpFetch, ReqwestFetcher, StorageClient};
use tracing::debug;

/// A `lat,lon` pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub const fn as_tuple(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

impl FromStr for LatLon {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON, got {s:?}"))?;
        let lat: f64 = lat.trim().parse().map_err(|e| format!("invalid latitude {lat:?}: {e}"))?;
        let lon: f64 = lon.trim().parse().map_err(|e| format!("invalid longitude {lon:?}: {e}"))?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {lat} out of range"));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(format!("longitude {lon} out of range"));
        }
        Ok(Self { lat, lon })
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub dataset: DatasetType,
    pub point: LatLon,
    pub tile: Option<TileDescriptor>,
    pub index_status: IndexStatus,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleReport {
    pub point: LatLon,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MobilityReport {
    pub point: LatLon,
    pub mobility: Option<Mobility>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEntryReport {
    pub name: String,
    pub size: usize,
}

/// Sampler wired from a [`PipelineConfig`].
pub struct Pipeline<H = ReqwestFetcher> {
    sampler: TerrainSampler<H>,
}

impl Pipeline<ReqwestFetcher> {
    /// Build a pipeline over the network backends in `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client = StorageClient::from_config(&config.storage.sources, config.storage.timeout())?;
        debug!(
            sources = client.sources().len(),
            timeout_secs = config.storage.timeout_secs,
            "storage client ready"
        );
        Ok(Self::with_client(config, Arc::new(client)))
    }
}

impl<H: HttpFetch> Pipeline<H> {
    pub fn with_client(config: &PipelineConfig, client: Arc<StorageClient<H>>) -> Self {
        Self {
            sampler: TerrainSampler::new(
                client,
                config.datasets.clone(),
                config.cache.tile_cache(),
                config.cache.archive_cache(),
            ),
        }
    }

    pub fn sampler(&self) -> &TerrainSampler<H> {
        &self.sampler
    }

    pub async fn resolve(&self, dataset: DatasetType, point: LatLon) -> ResolveReport {
        let tile = self
            .sampler
            .resolver()
            .resolve_tile(dataset, point.lat, point.lon)
            .await;
        ResolveReport {
            dataset,
            point,
            tile,
            index_status: self.sampler.resolver().index_status(dataset),
        }
    }

    pub async fn sample(&self, dataset: DatasetType, points: &[LatLon]) -> Vec<SampleReport> {
        let coords: Vec<(f64, f64)> = points.iter().map(LatLon::as_tuple).collect();
        let values = self.sampler.sample_batch(dataset, &coords).await;
        points
            .iter()
            .zip(values)
            .map(|(&point, value)| SampleReport { point, value })
            .collect()
    }

    pub async fn profile(&self, from: LatLon, to: LatLon, samples: usize) -> Vec<ProfilePoint> {
        self.sampler
            .sample_line(from.as_tuple(), to.as_tuple(), samples)
            .await
    }

    pub async fn mobility(&self, point: LatLon) -> Result<MobilityReport> {
        let mobility = self.sampler.mobility_at(point.lat, point.lon).await?;
        Ok(MobilityReport { point, mobility })
    }

    /// Entries of an archive, by storage path.
    pub async fn archive_entries(&self, path: &str) -> Result<Vec<ArchiveEntryReport>> {
        let entries = self.sampler.archives().entries(path).await?;
        Ok(entries
            .into_iter()
            .map(|e| ArchiveEntryReport {
                name: e.name,
                size: e.size,
            })
            .collect())
    }

    pub fn stats(&self) -> SamplerStats {
        self.sampler.stats()
    }
}
