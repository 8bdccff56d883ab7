//! Vegetation classes and the mobility factor consumed by path planning.

use serde::Serialize;
use std::fmt;

/// Vegetation density class derived from a vegetation index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VegetationClass {
    WaterOrCloud,
    BareOrUrban,
    SparseVegetation,
    GrassOrShrub,
    SparseForest,
    DenseForest,
}

impl VegetationClass {
    /// Movement factor in `[0, 1]` for this class alone.
    pub const fn mobility_factor(&self) -> f64 {
        match self {
            VegetationClass::WaterOrCloud => 0.0,
            VegetationClass::BareOrUrban => 1.0,
            VegetationClass::SparseVegetation => 0.9,
            VegetationClass::GrassOrShrub => 0.8,
            VegetationClass::SparseForest => 0.6,
            VegetationClass::DenseForest => 0.4,
        }
    }

    pub const fn as_label(&self) -> &'static str {
        match self {
            VegetationClass::WaterOrCloud => "water_or_cloud",
            VegetationClass::BareOrUrban => "bare_or_urban",
            VegetationClass::SparseVegetation => "sparse_vegetation",
            VegetationClass::GrassOrShrub => "grass_or_shrub",
            VegetationClass::SparseForest => "sparse_forest",
            VegetationClass::DenseForest => "dense_forest",
        }
    }
}

impl fmt::Display for VegetationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Upper bounds (exclusive) of each class, evaluated low to high.
const VEGETATION_LADDER: [(f64, VegetationClass); 5] = [
    (0.0, VegetationClass::WaterOrCloud),
    (0.2, VegetationClass::BareOrUrban),
    (0.4, VegetationClass::SparseVegetation),
    (0.6, VegetationClass::GrassOrShrub),
    (0.8, VegetationClass::SparseForest),
];

/// Slope bands as (upper bound in percent, exclusive; factor).
const SLOPE_BANDS: [(f64, f64); 5] = [(5.0, 1.0), (15.0, 0.9), (30.0, 0.6), (50.0, 0.4), (100.0, 0.2)];

/// Classify a physical (already scaled) vegetation index value.
///
/// NaN is treated as water or cloud.
pub fn classify_vegetation_index(value: f64) -> VegetationClass {
    if value.is_nan() {
        return VegetationClass::WaterOrCloud;
    }
    VEGETATION_LADDER
        .iter()
        .find(|(upper, _)| value < *upper)
        .map(|(_, class)| *class)
        .unwrap_or(VegetationClass::DenseForest)
}

/// Movement factor in `[0, 1]` for a slope; steeper than every band is 0.
pub fn slope_factor(slope_percent: f64) -> f64 {
    let slope = slope_percent.abs();
    SLOPE_BANDS
        .iter()
        .find(|(upper, _)| slope < *upper)
        .map(|(_, factor)| *factor)
        .unwrap_or(0.0)
}

/// Combined mobility factor. Zero means impassable.
pub fn compute_mobility_factor(class: VegetationClass, slope_percent: f64) -> f64 {
    class.mobility_factor() * slope_factor(slope_percent)
}

/// Mobility assessment at one coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mobility {
    pub vegetation: VegetationClass,
    pub slope_percent: f64,
    /// Product of the vegetation and slope factors.
    pub factor: f64,
}

impl Mobility {
    pub fn new(vegetation: VegetationClass, slope_percent: f64) -> Self {
        Self {
            vegetation,
            slope_percent,
            factor: compute_mobility_factor(vegetation, slope_percent),
        }
    }

    pub fn is_impassable(&self) -> bool {
        self.factor <= 0.0
    }
}
