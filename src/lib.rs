pub mod auth;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod notify;
pub mod report;
pub mod service;

pub use config::DetectorConfig;
pub use detection::{DefectDetector, ImageSource};
pub use error::DetectionError;
pub use models::{
    AnalysisDetails, ClassificationResult, ClassificationStatus, DefectLocation, FeatureVector,
    ImageSample, TextureDescriptor,
};
