//! Tile index documents.
//!
//! Two document shapes describe the tiles of a region:
//!
//! - elevation: `{ "metadata": .., "bounds": .., "tiles": { "<key>": [ {filename, bounds, ..} ] } }`
//! - vegetation: `{ "provincias": { "<name>": [ {provincia, filename, filepath, bounds} ] } }`
//!
//! A master index lists partitions (`{ "partitions": { "<key>": {bounds, index} } }`)
//! pointing at one such document each. A master index may also be a tile
//! document itself, in which case it is a single inline region
//! ([`INLINE_REGION`]) holding every tile in document order.
//!
//! Group order follows the document, which is what breaks ties between tiles
//! sharing an edge.

use crate::bounds::Bounds;
use crate::{Result, TerrainError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Region key of a master index that lists tiles directly.
pub const INLINE_REGION: &str = "*";

/// Raster dataset served by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    /// Elevation in metres.
    Elevation,
    /// Scaled vegetation index.
    Vegetation,
}

impl DatasetType {
    pub const ALL: [DatasetType; 2] = [DatasetType::Elevation, DatasetType::Vegetation];

    pub const fn as_label(&self) -> &'static str {
        match self {
            DatasetType::Elevation => "elevation",
            DatasetType::Vegetation => "vegetation",
        }
    }

    /// Scale factor applied when an index entry does not document one.
    pub const fn default_scale_factor(&self) -> f64 {
        match self {
            DatasetType::Elevation => 1.0,
            DatasetType::Vegetation => 10_000.0,
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for DatasetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elevation" | "dem" => Ok(DatasetType::Elevation),
            "vegetation" | "ndvi" => Ok(DatasetType::Vegetation),
            other => Err(format!("unknown dataset type: {other}")),
        }
    }
}

/// Whether an index came from storage or is the degraded empty stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    /// Nothing requested yet.
    NotLoaded,
    /// Parsed from a fetched document.
    Loaded,
    /// Every source failed; an empty document stands in.
    Fallback,
}

/// One raster tile as listed in an index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileDescriptor {
    /// Group key the tile is listed under (tile key or province name).
    pub key: String,
    /// Geographic coverage.
    pub bounds: Bounds,
    /// Archive holding the tile, as a storage path relative to the dataset root.
    pub source_archive: Option<String>,
    /// Entry name inside the archive, or the file name.
    pub entry_name: String,
    /// Direct storage path when the tile is not archived.
    pub file_path: Option<String>,
    pub dataset: DatasetType,
    /// Stored values are divided by this to get physical values.
    pub scale_factor: f64,
}

impl TileDescriptor {
    /// Storage path the tile bytes are fetched from when not archived.
    pub fn storage_path(&self) -> &str {
        self.file_path.as_deref().unwrap_or(&self.entry_name)
    }

    /// Stable identifier for caching the decoded tile.
    pub fn cache_key(&self) -> String {
        match &self.source_archive {
            Some(archive) => format!("{}:{archive}#{}", self.dataset, self.entry_name),
            None => format!("{}:{}", self.dataset, self.storage_path()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTileEntry {
    filename: String,
    bounds: Bounds,
    #[serde(default)]
    filepath: Option<String>,
    #[serde(default, alias = "source_archive")]
    archive: Option<String>,
    #[serde(default)]
    scale_factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPartition {
    bounds: Bounds,
    #[serde(alias = "index_path", alias = "path")]
    index: String,
}

/// Tiles of one region, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct TileIndex {
    dataset: DatasetType,
    tiles: Vec<TileDescriptor>,
    status: IndexStatus,
}

impl TileIndex {
    /// Parse a tile document of either shape.
    pub fn from_json(dataset: DatasetType, path: &str, doc: &Value) -> Result<Self> {
        let groups = tile_groups(dataset, path, doc)?;
        let default_archive = doc.get("archive").and_then(Value::as_str);

        let mut tiles = Vec::new();
        for (key, entries) in groups {
            let entries = entries
                .as_array()
                .ok_or_else(|| invalid(dataset, path, format!("group {key} is not an array")))?;
            for entry in entries {
                let raw: RawTileEntry = serde_json::from_value(entry.clone())
                    .map_err(|e| invalid(dataset, path, format!("tile in group {key}: {e}")))?;
                if !raw.bounds.is_valid() {
                    return Err(invalid(
                        dataset,
                        path,
                        format!("tile {} in group {key} has inverted bounds", raw.filename),
                    ));
                }
                tiles.push(TileDescriptor {
                    key: key.clone(),
                    bounds: raw.bounds,
                    source_archive: raw.archive.or_else(|| default_archive.map(str::to_string)),
                    entry_name: raw.filename,
                    file_path: raw.filepath,
                    dataset,
                    scale_factor: raw
                        .scale_factor
                        .filter(|s| *s != 0.0 && s.is_finite())
                        .unwrap_or(dataset.default_scale_factor()),
                });
            }
        }

        Ok(Self {
            dataset,
            tiles,
            status: IndexStatus::Loaded,
        })
    }

    /// Degraded stand-in used when the document could not be fetched.
    pub fn fallback(dataset: DatasetType) -> Self {
        Self {
            dataset,
            tiles: Vec::new(),
            status: IndexStatus::Fallback,
        }
    }

    /// First tile in document order whose bounds contain the point.
    pub fn find(&self, lat: f64, lon: f64) -> Option<&TileDescriptor> {
        self.tiles.iter().find(|t| t.bounds.contains(lat, lon))
    }

    pub fn dataset(&self) -> DatasetType {
        self.dataset
    }

    pub fn tiles(&self) -> &[TileDescriptor] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn status(&self) -> IndexStatus {
        self.status
    }

    /// Rectangle covering every tile.
    pub fn coverage(&self) -> Option<Bounds> {
        let mut tiles = self.tiles.iter();
        let first = tiles.next()?.bounds;
        Some(tiles.fold(first, |acc, t| acc.union(&t.bounds)))
    }
}

/// Where a partition's tiles come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionSource {
    /// A separate region document at this storage path.
    Remote(String),
    /// Tiles listed directly in the master document.
    Inline(Arc<TileIndex>),
}

/// One coarse partition (latitude band or province) of a master index.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub key: String,
    pub bounds: Bounds,
    pub source: PartitionSource,
}

/// Top-level index enumerating the partitions of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterIndex {
    dataset: DatasetType,
    partitions: Vec<Partition>,
    status: IndexStatus,
}

impl MasterIndex {
    /// Parse a master document, or a tile document used as one.
    pub fn from_json(dataset: DatasetType, path: &str, doc: &Value) -> Result<Self> {
        let listed = doc
            .get("partitions")
            .or_else(|| doc.get("fajas"))
            .and_then(Value::as_object);

        let partitions = match listed {
            Some(map) => map
                .iter()
                .map(|(key, value)| {
                    let raw: RawPartition = serde_json::from_value(value.clone())
                        .map_err(|e| invalid(dataset, path, format!("partition {key}: {e}")))?;
                    Ok(Partition {
                        key: key.clone(),
                        bounds: raw.bounds,
                        source: PartitionSource::Remote(raw.index),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            // Groups may overlap each other's extents, so they are not split
            // into partitions; one region keeps the whole document order.
            None => {
                let index = TileIndex::from_json(dataset, path, doc)?;
                match index.coverage() {
                    Some(bounds) => vec![Partition {
                        key: INLINE_REGION.to_string(),
                        bounds,
                        source: PartitionSource::Inline(Arc::new(index)),
                    }],
                    None => Vec::new(),
                }
            }
        };

        Ok(Self {
            dataset,
            partitions,
            status: IndexStatus::Loaded,
        })
    }

    /// Degraded stand-in with no partitions.
    pub fn fallback(dataset: DatasetType) -> Self {
        Self {
            dataset,
            partitions: Vec::new(),
            status: IndexStatus::Fallback,
        }
    }

    /// Partition containing the point, or the one whose centroid is nearest.
    ///
    /// Returns `None` only when there are no partitions at all.
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<&Partition> {
        if let Some(p) = self.partitions.iter().find(|p| p.bounds.contains(lat, lon)) {
            return Some(p);
        }

        // Strict comparison keeps the first of equally distant partitions.
        let mut nearest: Option<(&Partition, f64)> = None;
        for p in &self.partitions {
            let d = p.bounds.centroid_distance_sq(lat, lon);
            if nearest.map_or(true, |(_, best)| d < best) {
                nearest = Some((p, d));
            }
        }
        nearest.map(|(p, _)| p)
    }

    pub fn partition(&self, key: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.key == key)
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn dataset(&self) -> DatasetType {
        self.dataset
    }

    pub fn status(&self) -> IndexStatus {
        self.status
    }
}

fn tile_groups<'a>(
    dataset: DatasetType,
    path: &str,
    doc: &'a Value,
) -> Result<impl Iterator<Item = (&'a String, &'a Value)>> {
    let groups: &Map<String, Value> = doc
        .get("tiles")
        .or_else(|| doc.get("provincias"))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            invalid(
                dataset,
                path,
                "expected a \"tiles\" or \"provincias\" object".to_string(),
            )
        })?;
    Ok(groups.iter())
}

fn invalid(dataset: DatasetType, path: &str, reason: String) -> TerrainError {
    TerrainError::InvalidIndex {
        dataset: dataset.as_label(),
        path: path.to_string(),
        reason,
    }
}
