//! Per-category RGB threshold rules and the first-match classifier.

use crate::ClassifyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terrain feature category, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Water,
    DenseVegetation,
    Roads,
    Buildings,
    BareSoil,
}

impl Category {
    /// Every category in the order rules are evaluated.
    pub const ALL: [Category; 5] = [
        Category::Water,
        Category::DenseVegetation,
        Category::Roads,
        Category::Buildings,
        Category::BareSoil,
    ];

    pub const fn as_label(&self) -> &'static str {
        match self {
            Category::Water => "water",
            Category::DenseVegetation => "dense_vegetation",
            Category::Roads => "roads",
            Category::Buildings => "buildings",
            Category::BareSoil => "bare_soil",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Blue clearly above both other channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterRule {
    pub min_blue: u8,
    /// Blue minus the larger of red and green.
    pub min_blue_excess: u8,
}

impl Default for WaterRule {
    fn default() -> Self {
        Self {
            min_blue: 70,
            min_blue_excess: 20,
        }
    }
}

/// Very dark pixels where green dominates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseVegetationRule {
    /// Upper bound on the channel mean.
    pub max_brightness: u8,
    /// Green minus the larger of red and blue.
    pub min_green_excess: u8,
}

impl Default for DenseVegetationRule {
    fn default() -> Self {
        Self {
            max_brightness: 90,
            min_green_excess: 12,
        }
    }
}

/// Near-neutral pixels whose channel mean falls in a band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformBandRule {
    pub min_level: u8,
    pub max_level: u8,
    /// Largest allowed difference between the brightest and darkest channel.
    pub max_spread: u8,
}

impl UniformBandRule {
    pub const ROADS: Self = Self {
        min_level: 90,
        max_level: 170,
        max_spread: 12,
    };

    pub const BUILDINGS: Self = Self {
        min_level: 150,
        max_level: 250,
        max_spread: 25,
    };

    fn matches(&self, rgb: [u8; 3]) -> bool {
        let level = mean(rgb);
        level >= self.min_level as u32 && level <= self.max_level as u32 && spread(rgb) <= self.max_spread
    }

    fn validate(&self, name: &str) -> Result<(), ClassifyError> {
        if self.min_level > self.max_level {
            return Err(ClassifyError::InvalidConfig(format!(
                "{name}: min_level {} exceeds max_level {}",
                self.min_level, self.max_level
            )));
        }
        Ok(())
    }
}

/// Warm pixels (red over green over blue) in a brightness band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BareSoilRule {
    pub min_red: u8,
    pub max_red: u8,
    /// Red minus blue.
    pub min_red_blue_gap: u8,
}

impl Default for BareSoilRule {
    fn default() -> Self {
        Self {
            min_red: 100,
            max_red: 240,
            min_red_blue_gap: 25,
        }
    }
}

/// Band fields given in a config document; missing ones keep the
/// category's own default band.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BandOverride {
    min_level: Option<u8>,
    max_level: Option<u8>,
    max_spread: Option<u8>,
}

impl BandOverride {
    fn apply(self, base: UniformBandRule) -> UniformBandRule {
        UniformBandRule {
            min_level: self.min_level.unwrap_or(base.min_level),
            max_level: self.max_level.unwrap_or(base.max_level),
            max_spread: self.max_spread.unwrap_or(base.max_spread),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRules {
    water: WaterRule,
    dense_vegetation: DenseVegetationRule,
    roads: BandOverride,
    buildings: BandOverride,
    bare_soil: BareSoilRule,
}

impl From<RawRules> for ClassificationRules {
    fn from(raw: RawRules) -> Self {
        Self {
            water: raw.water,
            dense_vegetation: raw.dense_vegetation,
            roads: raw.roads.apply(UniformBandRule::ROADS),
            buildings: raw.buildings.apply(UniformBandRule::BUILDINGS),
            bare_soil: raw.bare_soil,
        }
    }
}

/// Threshold rules for every category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRules")]
pub struct ClassificationRules {
    pub water: WaterRule,
    pub dense_vegetation: DenseVegetationRule,
    /// Narrow gray band.
    pub roads: UniformBandRule,
    /// Uniform, lighter band.
    pub buildings: UniformBandRule,
    pub bare_soil: BareSoilRule,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            water: WaterRule::default(),
            dense_vegetation: DenseVegetationRule::default(),
            roads: UniformBandRule::ROADS,
            buildings: UniformBandRule::BUILDINGS,
            bare_soil: BareSoilRule::default(),
        }
    }
}

impl ClassificationRules {
    /// Whether a pixel satisfies one category's rule in isolation.
    pub fn matches(&self, category: Category, rgb: [u8; 3]) -> bool {
        let [r, g, b] = rgb;
        match category {
            Category::Water => {
                b >= self.water.min_blue
                    && b as i32 - r.max(g) as i32 >= self.water.min_blue_excess as i32
            }
            Category::DenseVegetation => {
                mean(rgb) <= self.dense_vegetation.max_brightness as u32
                    && g as i32 - r.max(b) as i32 >= self.dense_vegetation.min_green_excess as i32
            }
            Category::Roads => self.roads.matches(rgb),
            Category::Buildings => self.buildings.matches(rgb),
            Category::BareSoil => {
                r >= self.bare_soil.min_red
                    && r <= self.bare_soil.max_red
                    && r > g
                    && g > b
                    && r as i32 - b as i32 >= self.bare_soil.min_red_blue_gap as i32
            }
        }
    }

    /// First category, in [`Category::ALL`] order, whose rule matches.
    pub fn classify(&self, rgb: [u8; 3]) -> Option<Category> {
        Category::ALL.into_iter().find(|c| self.matches(*c, rgb))
    }

    pub fn validate(&self) -> Result<(), ClassifyError> {
        self.roads.validate("roads")?;
        self.buildings.validate("buildings")?;
        if self.bare_soil.min_red > self.bare_soil.max_red {
            return Err(ClassifyError::InvalidConfig(format!(
                "bare_soil: min_red {} exceeds max_red {}",
                self.bare_soil.min_red, self.bare_soil.max_red
            )));
        }
        Ok(())
    }
}

/// Sampling and indexing parameters for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Classify every Nth pixel along each axis.
    pub stride: u32,
    /// Bucket size, in pixels, of the feature grid.
    pub grid_cell_size: f64,
    pub rules: ClassificationRules,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stride: 4,
            grid_cell_size: 32.0,
            rules: ClassificationRules::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ClassifyError> {
        if self.stride == 0 {
            return Err(ClassifyError::InvalidConfig("stride must be at least 1".into()));
        }
        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return Err(ClassifyError::InvalidConfig(format!(
                "grid cell size must be positive, got {}",
                self.grid_cell_size
            )));
        }
        self.rules.validate()
    }
}

fn mean([r, g, b]: [u8; 3]) -> u32 {
    (r as u32 + g as u32 + b as u32) / 3
}

fn spread([r, g, b]: [u8; 3]) -> u8 {
    r.max(g).max(b) - r.min(g).min(b)
}
