//! Terrain classification of captured map imagery.
//!
//! An RGBA capture is sampled on a stride lattice and each sampled pixel is
//! assigned to the first matching category (water, dense vegetation, roads,
//! buildings, bare soil). The result lists features per category, summary
//! statistics and a bucket map equivalent to a
//! [`SpatialHashGrid`](tacmap_grid::SpatialHashGrid) over the features.
//!
//! [`analyze_image`] is the pure analysis; [`ClassificationWorker`] runs it on
//! a dedicated thread behind a typed message protocol.
//!
//! ```no_run
//! use tacmap_classify::{AnalysisConfig, ClassificationWorker, ImageData};
//!
//! let worker = ClassificationWorker::spawn()?;
//! let image = ImageData::new(2, 1, vec![30, 60, 140, 255, 128, 128, 132, 255])?;
//! let result = worker.analyze(image, AnalysisConfig { stride: 1, ..Default::default() })?;
//! println!("coverage: {:.1}%", result.stats.coverage_percent);
//! # Ok::<(), tacmap_classify::ClassifyError>(())
//! ```

mod analysis;
mod error;
mod image;
mod protocol;
mod rules;
mod worker;

pub use analysis::{analyze_image, AnalysisResult, AnalysisStats, Feature, FeatureRef, GridBucket};
pub use error::ClassifyError;
pub use image::ImageData;
pub use protocol::{WorkerRequest, WorkerResponse};
pub use rules::{
    AnalysisConfig, BareSoilRule, Category, ClassificationRules, DenseVegetationRule,
    UniformBandRule, WaterRule,
};
pub use worker::ClassificationWorker;
