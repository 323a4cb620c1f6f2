use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader, imageops::FilterType};
use std::io::Cursor;

use crate::error::{DetectionError, Result};
use crate::models::ImageSample;

/// Where the image bytes come from
#[derive(Debug, Clone)]
pub enum ImageSource<'a> {
    Path(PathBuf),
    Bytes(&'a [u8]),
}

impl<'a> ImageSource<'a> {
    pub fn path<P: AsRef<Path>>(path: P) -> Self {
        ImageSource::Path(path.as_ref().to_path_buf())
    }

    pub fn bytes(bytes: &'a [u8]) -> Self {
        ImageSource::Bytes(bytes)
    }
}

/// Decode any supported format, guessing it from the content rather than the extension
pub fn decode(source: &ImageSource<'_>) -> Result<DynamicImage> {
    match source {
        ImageSource::Path(path) => ImageReader::open(path)
            .map_err(|e| DetectionError::Decode(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| DetectionError::Decode(format!("{}: {}", path.display(), e)))?
            .decode()
            .map_err(|e| DetectionError::Decode(format!("{}: {}", path.display(), e))),
        ImageSource::Bytes(bytes) => {
            if bytes.is_empty() {
                return Err(DetectionError::Decode("empty image buffer".into()));
            }
            ImageReader::new(Cursor::new(*bytes))
                .with_guessed_format()
                .map_err(|e| DetectionError::Decode(e.to_string()))?
                .decode()
                .map_err(|e| DetectionError::Decode(e.to_string()))
        }
    }
}

/// Convert to grayscale, resize to `size`×`size` and normalize to [0, 1]
pub fn preprocess(img: &DynamicImage, size: u32) -> ImageSample {
    let gray = img.to_luma8();
    let resized = image::imageops::resize(&gray, size, size, FilterType::Triangle);
    ImageSample::from_luma(&resized)
}

/// Decode and preprocess in one go
pub fn load_sample(source: &ImageSource<'_>, size: u32) -> Result<ImageSample> {
    let img = decode(source)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(DetectionError::Decode("image has no pixels".into()));
    }
    Ok(preprocess(&img, size))
}
