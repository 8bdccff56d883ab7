//! Configuration, logging and command plumbing for the `tacmap` binary.
//!
//! The library half exists so the commands can be driven from tests with a
//! local storage directory instead of the network.

pub mod config;
pub mod error;
pub mod imagery;
pub mod logging;
pub mod pipeline;

pub use config::{CacheSettings, PipelineConfig, StorageSettings};
pub use error::{ConfigError, Result, RunnerError};
pub use imagery::{classify_file, decode_image, load_image};
pub use logging::init_logging;
pub use pipeline::{
    ArchiveEntryReport, LatLon, MobilityReport, Pipeline, ResolveReport, SampleReport,
};
