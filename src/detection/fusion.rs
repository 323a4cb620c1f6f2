use crate::config::FusionConfig;
use crate::models::{ClassificationStatus, FeatureVector};

/// Features after scaling onto comparable [0, 1] ranges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedFeatures {
    pub mean_intensity: f64,
    pub std_intensity: f64,
    pub contrast: f64,
    pub edge_density: f64,
}

impl NormalizedFeatures {
    pub fn from_features(features: Option<&FeatureVector>, config: &FusionConfig) -> Self {
        let (mean, std, contrast, edges) = match features {
            Some(f) => (f.mean_intensity, f.std_intensity, f.contrast, f.edge_density),
            None => (
                config.default_mean_intensity,
                config.default_std_intensity,
                config.default_contrast,
                config.default_edge_density,
            ),
        };
        Self {
            mean_intensity: unit(mean),
            std_intensity: unit(std / config.std_divisor),
            contrast: unit(contrast / config.contrast_divisor),
            edge_density: unit(edges * config.edge_density_scale),
        }
    }
}

/// Content-only probability and how many indicators fired
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentScore {
    pub probability: f64,
    pub indicators: u32,
}

pub fn content_probability(features: &NormalizedFeatures, config: &FusionConfig) -> ContentScore {
    let checks = [
        (
            features.edge_density > config.edge_density_threshold,
            config.edge_density_increment,
        ),
        (
            features.contrast > config.contrast_threshold,
            config.contrast_increment,
        ),
        (
            features.mean_intensity < config.dark_intensity_threshold,
            config.dark_intensity_increment,
        ),
        (
            features.std_intensity > config.std_threshold,
            config.std_increment,
        ),
    ];

    let mut probability = config.base_probability;
    let mut indicators = 0;
    for (fired, increment) in checks {
        if fired {
            indicators += 1;
            probability += increment;
        }
    }

    // With nothing suspicious the base is replaced, not kept
    if indicators == 0 {
        probability = config.no_indicator_probability;
    }

    ContentScore {
        probability: clamp_probability(probability, config),
        indicators,
    }
}

/// Weight, dampen and clamp the two scores into the final defect probability
pub fn fuse(filename_score: f64, content_probability: f64, config: &FusionConfig) -> f64 {
    let filename_score = clamp_probability(filename_score, config);
    let content_probability = clamp_probability(content_probability, config);
    let combined = filename_score * config.filename_weight
        + content_probability * config.content_weight;
    clamp_probability(combined * config.dampening, config)
}

pub fn classify(defect_probability: f64, config: &FusionConfig) -> ClassificationStatus {
    if defect_probability > config.decision_threshold {
        ClassificationStatus::Defective
    } else {
        ClassificationStatus::NonDefective
    }
}

/// Percentage form of a probability, limited to the configured bounds
pub fn confidence_percentage(defect_probability: f64, config: &FusionConfig) -> f64 {
    (defect_probability * 100.0).clamp(
        config.min_probability * 100.0,
        config.max_probability * 100.0,
    )
}

pub fn clamp_probability(value: f64, config: &FusionConfig) -> f64 {
    if value.is_nan() {
        return config.min_probability;
    }
    value.clamp(config.min_probability, config.max_probability)
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
