//! Error types for the terrain crate.

use tacmap_fetch::FetchError;
use thiserror::Error;

/// Errors that can occur when resolving or sampling terrain data.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Every storage source failed for an index or tile.
    #[error("Network error: {0}")]
    Network(#[source] FetchError),

    /// Any other fetch failure (archive entry missing, malformed archive...).
    #[error("Fetch error: {0}")]
    Fetch(#[source] FetchError),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Raster dimensions and data do not agree.
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    /// Unsupported sample layout in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// Index document does not have a recognised shape.
    #[error("Invalid {dataset} index {path}: {reason}")]
    InvalidIndex {
        /// Dataset type label.
        dataset: &'static str,
        /// Logical path of the document.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The master index has no partition with this key.
    #[error("Unknown {dataset} region: {key}")]
    UnknownRegion {
        /// Dataset type label.
        dataset: &'static str,
        /// Requested region key.
        key: String,
    },

    /// The blocking decode task panicked or was cancelled.
    #[error("Tile decode task failed: {0}")]
    DecodeTask(#[from] tokio::task::JoinError),
}

impl From<FetchError> for TerrainError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::ResourceUnavailable { .. } => TerrainError::Network(err),
            other => TerrainError::Fetch(other),
        }
    }
}

impl TerrainError {
    /// Whether every storage source failed.
    pub fn is_network(&self) -> bool {
        matches!(self, TerrainError::Network(_))
    }
}
