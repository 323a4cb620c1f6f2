use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Normalized single-channel image, values in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSample {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl ImageSample {
    /// Build a sample from an 8-bit grayscale image, scaling 0-255 to [0, 1]
    pub fn from_luma(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let values = gray.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Self { width, height, values }
    }

    /// Build a sample from raw row-major values. Returns None when the length
    /// does not match the dimensions or a value falls outside [0, 1].
    pub fn from_values(width: u32, height: u32, values: Vec<f32>) -> Option<Self> {
        if values.len() != (width as usize) * (height as usize) {
            return None;
        }
        if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return None;
        }
        Some(Self { width, height, values })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Logical shape as (height, width, channels)
    pub fn shape(&self) -> (u32, u32, u32) {
        (self.height, self.width, 1)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    /// Rescale back to an 8-bit image for operators that expect 0-255 input
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([(self.get(x, y) * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Texture fingerprint of a sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureDescriptor {
    /// 256 buckets of neighborhood codes; empty when texture extraction failed
    pub code_histogram: Vec<u32>,
    pub gradient_mean: f64,
    pub gradient_std: f64,
}

impl TextureDescriptor {
    pub fn is_empty(&self) -> bool {
        self.code_histogram.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub mean_intensity: f64,
    pub std_intensity: f64,
    pub contrast: f64,
    pub edge_density: f64,
    pub texture: TextureDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationStatus {
    Defective,
    NonDefective,
}

impl ClassificationStatus {
    /// Stored and serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Defective => "defective",
            ClassificationStatus::NonDefective => "non-defective",
        }
    }

    /// Human-facing form
    pub fn label(&self) -> &'static str {
        match self {
            ClassificationStatus::Defective => "Defective",
            ClassificationStatus::NonDefective => "Non-Defective",
        }
    }

    pub fn is_defective(&self) -> bool {
        matches!(self, ClassificationStatus::Defective)
    }
}

impl TryFrom<&str> for ClassificationStatus {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "defective" => Ok(ClassificationStatus::Defective),
            "non-defective" => Ok(ClassificationStatus::NonDefective),
            other => anyhow::bail!("Unknown classification label: {}", other),
        }
    }
}

impl std::fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker position in percent of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectLocation {
    pub x: u32,
    pub y: u32,
}

/// Intermediate values behind a classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub defect_probability: f64,
    pub filename_score: f64,
    pub content_probability: f64,
    /// None when feature extraction failed and defaults were used
    pub features: Option<FeatureVector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub status: ClassificationStatus,
    /// Percentage in [5, 95], or exactly 50 for the fallback result
    pub confidence: f64,
    pub defect_locations: Vec<DefectLocation>,
    pub details: Option<AnalysisDetails>,
    pub error: Option<String>,
}

impl ClassificationResult {
    pub const FALLBACK_CONFIDENCE: f64 = 50.0;

    /// Conservative result returned whenever analysis cannot complete
    pub fn fallback(note: impl Into<String>) -> Self {
        Self {
            status: ClassificationStatus::NonDefective,
            confidence: Self::FALLBACK_CONFIDENCE,
            defect_locations: Vec::new(),
            details: None,
            error: Some(note.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }

    pub fn defect_count(&self) -> usize {
        self.defect_locations.len()
    }

    /// Confidence formatted with two decimals, e.g. "14.40%"
    pub fn confidence_label(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}
