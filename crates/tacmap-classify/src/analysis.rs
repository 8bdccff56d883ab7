//! Pure image analysis: sample, classify, count and bucket.

use crate::image::ImageData;
use crate::rules::{AnalysisConfig, Category};
use crate::ClassifyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tacmap_grid::{CellKey, GridPoint, SpatialHashGrid};

/// One classified pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Pixel column.
    pub x: u32,
    /// Pixel row.
    pub y: u32,
    /// Column divided by image width, in `[0, 1)`.
    pub nx: f64,
    /// Row divided by image height, in `[0, 1)`.
    pub ny: f64,
    pub rgb: [u8; 3],
}

impl GridPoint for Feature {
    fn position(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

/// Position of a feature within [`AnalysisResult::features`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRef {
    pub category: Category,
    pub index: usize,
}

/// Features falling in one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBucket {
    pub cell: CellKey,
    pub features: Vec<FeatureRef>,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pixels visited (opaque pixels on the stride lattice).
    pub sampled: u64,
    /// Sampled pixels that matched a category.
    pub classified: u64,
    /// `classified / sampled` as a percentage.
    pub coverage_percent: f64,
    /// Feature count per category; every category is present.
    pub counts: BTreeMap<Category, usize>,
}

/// Output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub grid_cell_size: f64,
    /// Features per category, in scan order (row-major); every category is present.
    pub features: BTreeMap<Category, Vec<Feature>>,
    pub stats: AnalysisStats,
    /// Bucket map over every feature, sorted by cell.
    pub buckets: Vec<GridBucket>,
}

impl AnalysisResult {
    /// Features of one category.
    pub fn features_of(&self, category: Category) -> &[Feature] {
        self.features.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rebuild a queryable grid over every feature, using the run's cell size.
    pub fn feature_grid(&self) -> SpatialHashGrid<&Feature> {
        SpatialHashGrid::from_points(self.grid_cell_size, self.features.values().flatten())
    }

    /// Rebuild a queryable grid over one category.
    pub fn category_grid(&self, category: Category) -> SpatialHashGrid<&Feature> {
        SpatialHashGrid::from_points(self.grid_cell_size, self.features_of(category))
    }
}

struct Located {
    at: (f64, f64),
    feature: FeatureRef,
}

impl GridPoint for Located {
    fn position(&self) -> (f64, f64) {
        self.at
    }
}

/// Classify every `stride`-th pixel along each axis.
///
/// Fully transparent pixels are skipped and not counted as sampled. Pixels
/// matching no rule are omitted from every category. The result depends
/// only on the inputs.
pub fn analyze_image(image: &ImageData, config: &AnalysisConfig) -> Result<AnalysisResult, ClassifyError> {
    image.validate()?;
    config.validate()?;

    let mut features: BTreeMap<Category, Vec<Feature>> =
        Category::ALL.iter().map(|c| (*c, Vec::new())).collect();
    let mut grid = SpatialHashGrid::new(config.grid_cell_size);
    let mut sampled = 0u64;

    let stride = config.stride as usize;
    for y in (0..image.height).step_by(stride) {
        for x in (0..image.width).step_by(stride) {
            let Some([r, g, b, a]) = image.pixel(x, y) else {
                continue;
            };
            if a == 0 {
                continue;
            }
            sampled += 1;

            let rgb = [r, g, b];
            let Some(category) = config.rules.classify(rgb) else {
                continue;
            };

            let list = features.entry(category).or_default();
            grid.insert(Located {
                at: (x as f64, y as f64),
                feature: FeatureRef {
                    category,
                    index: list.len(),
                },
            });
            list.push(Feature {
                x,
                y,
                nx: x as f64 / image.width as f64,
                ny: y as f64 / image.height as f64,
                rgb,
            });
        }
    }

    let counts: BTreeMap<Category, usize> =
        features.iter().map(|(c, list)| (*c, list.len())).collect();
    let classified: u64 = counts.values().map(|n| *n as u64).sum();
    let coverage_percent = if sampled == 0 {
        0.0
    } else {
        classified as f64 / sampled as f64 * 100.0
    };

    let mut buckets: Vec<GridBucket> = grid
        .into_buckets()
        .into_iter()
        .map(|(cell, items)| GridBucket {
            cell,
            features: items.into_iter().map(|l| l.feature).collect(),
        })
        .collect();
    buckets.sort_by_key(|b| b.cell);

    Ok(AnalysisResult {
        width: image.width,
        height: image.height,
        stride: config.stride,
        grid_cell_size: config.grid_cell_size,
        features,
        stats: AnalysisStats {
            sampled,
            classified,
            coverage_percent,
            counts,
        },
        buckets,
    })
}
