//! # tacmap-dem
//!
//! Elevation and vegetation rasters for the terrain planner.
//!
//! This crate provides:
//! - Coordinate to tile resolution across a master index of partitions and
//!   per-region tile indices
//! - Raster tile decoding (single-band GeoTIFF) and sampling, nearest pixel
//!   and bilinear
//! - Elevation profiles, slope and the vegetation/slope mobility factor used
//!   by path planning
//!
//! Tiles and indices are fetched through [`tacmap_fetch::StorageClient`], so
//! every download goes through the CDN, origin and bundled-copy fallback.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tacmap_dem::{DatasetPaths, DatasetType, TerrainSampler};
//! use tacmap_fetch::{CacheConfig, ReqwestFetcher, SourceConfig, StorageClient};
//!
//! # async fn run() -> tacmap_dem::Result<()> {
//! let config = SourceConfig {
//!     cdn_base: Some("https://cdn.example.org/terrain".into()),
//!     ..Default::default()
//! };
//! let client = Arc::new(StorageClient::new(ReqwestFetcher::new()?, config.candidates()));
//! let sampler = TerrainSampler::new(
//!     client,
//!     DatasetPaths::default(),
//!     CacheConfig::new(32),
//!     CacheConfig::new(8),
//! );
//!
//! if let Some(elevation) = sampler.elevation(-31.42, -64.18).await? {
//!     println!("Elevation: {elevation:.1} m");
//! }
//! let ndvi = sampler.sample_value(DatasetType::Vegetation, -31.42, -64.18).await?;
//! # Ok(())
//! # }
//! ```

mod bounds;
mod error;
mod index;
mod mobility;
mod resolver;
mod sampler;
mod tile;

pub use bounds::{haversine_distance, Bounds, EARTH_RADIUS_M, METERS_PER_DEGREE};
pub use error::TerrainError;
pub use index::{
    DatasetType, IndexStatus, MasterIndex, Partition, PartitionSource, TileDescriptor, TileIndex,
    INLINE_REGION,
};
pub use mobility::{
    classify_vegetation_index, compute_mobility_factor, slope_factor, Mobility, VegetationClass,
};
pub use resolver::{DatasetPaths, TileIndexResolver};
pub use sampler::{ProfilePoint, SamplerStats, TerrainSampler, DEFAULT_TILE_CAPACITY};
pub use tile::RasterTile;

/// Result type for terrain operations.
pub type Result<T> = std::result::Result<T, TerrainError>;
