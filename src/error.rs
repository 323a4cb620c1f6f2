//! Failure kinds of the scoring pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    /// Unreadable path, empty buffer, corrupt or unsupported image data
    #[error("Error processing image: {0}")]
    Decode(String),

    /// Feature extraction could not produce any features
    #[error("Error analyzing image content: {0}")]
    Extraction(String),

    /// Anything else that stopped the pipeline
    #[error("Analysis error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, DetectionError>;
