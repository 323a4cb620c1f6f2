pub mod features;
pub mod filename;
pub mod fusion;
pub mod loader;
pub mod locations;

use std::panic::{self, AssertUnwindSafe};

use rand::{Rng, SeedableRng, rngs::StdRng};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::DetectorConfig;
use crate::error::{DetectionError, Result};
use crate::models::{AnalysisDetails, ClassificationResult, FeatureVector, ImageSample};

pub use loader::ImageSource;

/// Scoring pipeline orchestrator.
///
/// Holds no mutable state, so one detector can serve any number of threads.
#[derive(Debug, Clone, Default)]
pub struct DefectDetector {
    config: DetectorConfig,
}

impl DefectDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Classify an image, never failing.
    ///
    /// Marker positions are drawn from a generator seeded with the SHA-256 of
    /// the image bytes, so identical input yields identical output.
    pub fn detect(&self, source: &ImageSource<'_>, filename: Option<&str>) -> ClassificationResult {
        let owned;
        let bytes: &[u8] = match source {
            ImageSource::Bytes(bytes) => *bytes,
            ImageSource::Path(path) => match std::fs::read(path) {
                Ok(data) => {
                    owned = data;
                    &owned
                }
                Err(e) => {
                    let error = DetectionError::Decode(format!("{}: {}", path.display(), e));
                    warn!("{}", error);
                    return ClassificationResult::fallback(error.to_string());
                }
            },
        };

        let mut rng = StdRng::seed_from_u64(content_seed(bytes));
        self.detect_with_rng(&ImageSource::Bytes(bytes), filename, &mut rng)
    }

    /// Classify an image with an explicit random source for the markers, never failing
    pub fn detect_with_rng<R: Rng + ?Sized>(
        &self,
        source: &ImageSource<'_>,
        filename: Option<&str>,
        rng: &mut R,
    ) -> ClassificationResult {
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.try_detect(source, filename, rng)))
                .unwrap_or_else(|cause| Err(DetectionError::Pipeline(panic_message(cause))));

        match outcome {
            Ok(result) => result,
            Err(error) => {
                warn!("Detection degraded to fallback: {}", error);
                ClassificationResult::fallback(error.to_string())
            }
        }
    }

    /// Run every stage, surfacing the first failure
    pub fn try_detect<R: Rng + ?Sized>(
        &self,
        source: &ImageSource<'_>,
        filename: Option<&str>,
        rng: &mut R,
    ) -> Result<ClassificationResult> {
        debug!("Loading image");
        let sample = loader::load_sample(source, self.config.image.size)?;
        self.analyze_sample(&sample, filename, rng)
    }

    /// Score an already preprocessed sample
    pub fn analyze_sample<R: Rng + ?Sized>(
        &self,
        sample: &ImageSample,
        filename: Option<&str>,
        rng: &mut R,
    ) -> Result<ClassificationResult> {
        if sample.is_empty() {
            return Err(DetectionError::Pipeline("empty sample".into()));
        }

        debug!("Extracting features from {}x{} sample", sample.width(), sample.height());
        let features = match features::extract_features(sample, &self.config.image) {
            Ok(features) => {
                debug!(
                    mean = features.mean_intensity,
                    std = features.std_intensity,
                    contrast = features.contrast,
                    edge_density = features.edge_density,
                    "Features extracted"
                );
                Some(features)
            }
            Err(DetectionError::Extraction(reason)) => {
                warn!("Feature extraction failed, scoring with default features: {}", reason);
                None
            }
            Err(other) => return Err(other),
        };

        Ok(self.classify(features, sample.width(), filename, rng))
    }

    /// Fuse features (or defaults when `features` is None) with the filename hint
    pub fn classify<R: Rng + ?Sized>(
        &self,
        features: Option<FeatureVector>,
        frame: u32,
        filename: Option<&str>,
        rng: &mut R,
    ) -> ClassificationResult {
        let fusion_config = &self.config.fusion;

        let filename_score =
            filename::score_filename(filename, &self.config.keywords, &self.config.filename);
        let normalized =
            fusion::NormalizedFeatures::from_features(features.as_ref(), fusion_config);
        let content = fusion::content_probability(&normalized, fusion_config);
        let defect_probability = fusion::fuse(filename_score, content.probability, fusion_config);
        let status = fusion::classify(defect_probability, fusion_config);

        debug!(
            filename_score,
            content_probability = content.probability,
            indicators = content.indicators,
            defect_probability,
            "Scores fused"
        );

        let defect_locations = if status.is_defective() {
            locations::synthesize_locations(rng, frame, &self.config.locations)
        } else {
            Vec::new()
        };

        let confidence = self
            .config
            .display
            .confidence_override
            .unwrap_or_else(|| fusion::confidence_percentage(defect_probability, fusion_config));

        ClassificationResult {
            status,
            confidence,
            defect_locations,
            details: Some(AnalysisDetails {
                defect_probability,
                filename_score,
                content_probability: content.probability,
                features,
            }),
            error: None,
        }
    }
}

/// First eight bytes of the SHA-256 digest of `bytes`
pub fn content_seed(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}

fn panic_message(cause: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unexpected panic".to_string()
    }
}
