//! Tunable scoring parameters.
//!
//! Every keyword list, weight and threshold used by the detector lives here so
//! it can be adjusted from a TOML file without touching the scoring code.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level detector configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub image: ImageConfig,
    pub keywords: KeywordConfig,
    pub filename: FilenameScoreConfig,
    pub fusion: FusionConfig,
    pub locations: LocationConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Side length of the square sample every image is resized to
    pub size: u32,
    /// Canny hysteresis thresholds on the 0-255 copy
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: 224,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub defect: Vec<String>,
    pub normal: Vec<String>,
}

const DEFECT_KEYWORDS: &[&str] = &[
    "defect",
    "fracture",
    "abnormal",
    "tumor",
    "pneumonia",
    "break",
    "crack",
    "infection",
    "broken",
    "damaged",
    "injury",
    "lesion",
    "mass",
    "nodule",
    "opacity",
    "shadow",
    "consolidation",
    "effusion",
    "pneumothorax",
    "atelectasis",
    "fracture",
    "dislocation",
    "arthritis",
    "osteoporosis",
    "cancer",
    "metastasis",
    "edema",
    "hemorrhage",
];

const NORMAL_KEYWORDS: &[&str] = &[
    "normal",
    "healthy",
    "clear",
    "good",
    "fine",
    "ok",
    "regular",
    "standard",
    "baseline",
    "unremarkable",
    "negative",
    "clean",
    "intact",
    "well",
    "proper",
    "correct",
    "typical",
];

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            defect: DEFECT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            normal: NORMAL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Score table for the filename heuristic, in precedence order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameScoreConfig {
    pub missing: f64,
    pub only_defect: f64,
    pub only_normal: f64,
    pub defect_majority: f64,
    pub normal_majority: f64,
    pub tie: f64,
}

impl Default for FilenameScoreConfig {
    fn default() -> Self {
        Self {
            missing: 0.5,
            only_defect: 0.95,
            only_normal: 0.05,
            defect_majority: 0.80,
            normal_majority: 0.20,
            tie: 0.50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub filename_weight: f64,
    pub content_weight: f64,
    /// Global multiplier applied after weighting
    pub dampening: f64,
    pub base_probability: f64,
    /// Content probability used when no indicator fires
    pub no_indicator_probability: f64,
    pub decision_threshold: f64,
    pub min_probability: f64,
    pub max_probability: f64,

    pub edge_density_scale: f64,
    pub std_divisor: f64,
    pub contrast_divisor: f64,

    pub edge_density_threshold: f64,
    pub edge_density_increment: f64,
    pub contrast_threshold: f64,
    pub contrast_increment: f64,
    /// Fires when normalized mean intensity is *below* this value
    pub dark_intensity_threshold: f64,
    pub dark_intensity_increment: f64,
    pub std_threshold: f64,
    pub std_increment: f64,

    /// Feature values assumed when extraction produced nothing
    pub default_mean_intensity: f64,
    pub default_std_intensity: f64,
    pub default_contrast: f64,
    pub default_edge_density: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            filename_weight: 0.2,
            content_weight: 0.8,
            dampening: 0.8,
            base_probability: 0.2,
            no_indicator_probability: 0.1,
            decision_threshold: 0.6,
            min_probability: 0.05,
            max_probability: 0.95,

            edge_density_scale: 10.0,
            std_divisor: 0.5,
            contrast_divisor: 255.0,

            edge_density_threshold: 0.4,
            edge_density_increment: 0.30,
            contrast_threshold: 0.8,
            contrast_increment: 0.25,
            dark_intensity_threshold: 0.2,
            dark_intensity_increment: 0.20,
            std_threshold: 0.8,
            std_increment: 0.15,

            default_mean_intensity: 0.5,
            default_std_intensity: 0.1,
            default_contrast: 0.5,
            default_edge_density: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Pixels kept clear along every frame edge
    pub margin: u32,
    pub min_count: usize,
    pub max_count: usize,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            margin: 20,
            min_count: 1,
            max_count: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// When set, replaces the computed confidence in user-facing output
    pub confidence_override: Option<f64>,
}

impl DetectorConfig {
    /// Load configuration from a TOML file. Missing sections and fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DetectorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.size == 0 {
            return Err(ConfigError::Invalid("image.size must be positive".into()));
        }
        if self.image.canny_low > self.image.canny_high {
            return Err(ConfigError::Invalid(
                "image.canny_low must not exceed image.canny_high".into(),
            ));
        }

        let fusion = &self.fusion;
        if !(0.0..=1.0).contains(&fusion.min_probability)
            || !(0.0..=1.0).contains(&fusion.max_probability)
            || fusion.min_probability > fusion.max_probability
        {
            return Err(ConfigError::Invalid(format!(
                "fusion probability bounds [{}, {}] are not an ordered range within [0, 1]",
                fusion.min_probability, fusion.max_probability
            )));
        }
        if fusion.std_divisor <= 0.0 || fusion.contrast_divisor <= 0.0 {
            return Err(ConfigError::Invalid(
                "fusion normalization divisors must be positive".into(),
            ));
        }

        let override_value = self.display.confidence_override;
        if let Some(value) = override_value.filter(|v| !(0.0..=100.0).contains(v)) {
            return Err(ConfigError::Invalid(format!(
                "display.confidence_override {} is not a percentage",
                value
            )));
        }

        let loc = &self.locations;
        if loc.min_count == 0 || loc.min_count > loc.max_count {
            return Err(ConfigError::Invalid(format!(
                "locations count range {}..={} is empty",
                loc.min_count, loc.max_count
            )));
        }
        if loc.margin.saturating_mul(2) >= self.image.size {
            return Err(ConfigError::Invalid(format!(
                "locations.margin {} leaves no room in a {}px frame",
                loc.margin, self.image.size
            )));
        }

        Ok(())
    }
}
