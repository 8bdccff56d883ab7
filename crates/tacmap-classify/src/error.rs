//! Error types for the classification crate.

use thiserror::Error;

/// Errors that can occur when classifying imagery.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Pixel buffer does not match its declared dimensions.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Stride, cell size or a threshold rule is out of range.
    #[error("Invalid analysis config: {0}")]
    InvalidConfig(String),

    /// Error relayed by the worker thread.
    #[error("Worker error: {0}")]
    Worker(String),

    /// The worker thread is gone.
    #[error("Classification worker disconnected")]
    Disconnected,

    /// The worker thread could not be started.
    #[error("Failed to spawn classification worker: {0}")]
    Spawn(#[from] std::io::Error),
}
