//! Error types for the runner.

use std::path::PathBuf;
use tacmap_classify::ClassifyError;
use tacmap_dem::TerrainError;
use tacmap_fetch::FetchError;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`PipelineConfig`](crate::PipelineConfig).
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// Input image could not be read.
    #[error("TIFF decode error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Input image has a layout the classifier cannot take.
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking task panicked.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
