use image::GrayImage;
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use tracing::warn;

use crate::config::ImageConfig;
use crate::error::{DetectionError, Result};
use crate::models::{FeatureVector, ImageSample, TextureDescriptor};

pub const CODE_BUCKETS: usize = 256;

/// Neighbour offsets, clockwise from top-left. Bit k of a code belongs to entry k.
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub mean: f64,
    pub std: f64,
    pub contrast: f64,
}

/// Extract every feature from a sample.
///
/// Fails when the basic statistics cannot be computed or the edge thresholds are
/// unusable. A failing texture sub-feature is logged and replaced by an empty
/// descriptor.
pub fn extract_features(sample: &ImageSample, config: &ImageConfig) -> Result<FeatureVector> {
    let stats = intensity_stats(sample)?;
    let (low, high) = (config.canny_low, config.canny_high);
    if low.is_nan() || high.is_nan() || low > high {
        return Err(DetectionError::Extraction(format!(
            "invalid Canny thresholds {} / {}",
            low, high
        )));
    }
    let rescaled = sample.to_luma8();
    let edge_density = edge_density(&rescaled, config.canny_low, config.canny_high);

    let texture = match texture_descriptor(sample, &rescaled) {
        Ok(texture) => texture,
        Err(e) => {
            warn!("Texture features unavailable: {}", e);
            TextureDescriptor::default()
        }
    };

    Ok(FeatureVector {
        mean_intensity: stats.mean,
        std_intensity: stats.std,
        contrast: stats.contrast,
        edge_density,
        texture,
    })
}

/// Mean, population standard deviation and max-min span
pub fn intensity_stats(sample: &ImageSample) -> Result<IntensityStats> {
    let (mean, std) = mean_std(sample.values().iter().map(|&v| v as f64))
        .ok_or_else(|| DetectionError::Extraction("sample has no pixels".into()))?;

    let (min, max) = sample
        .values()
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let stats = IntensityStats {
        mean,
        std,
        contrast: (max - min) as f64,
    };
    if !stats.mean.is_finite() || !stats.std.is_finite() || !stats.contrast.is_finite() {
        return Err(DetectionError::Extraction("non-finite intensity statistics".into()));
    }
    Ok(stats)
}

/// Fraction of pixels marked by the Canny detector
pub fn edge_density(gray: &GrayImage, low_threshold: f32, high_threshold: f32) -> f64 {
    let total = gray.width() as usize * gray.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let edges = canny(gray, low_threshold, high_threshold);
    let count = edges.pixels().filter(|p| p[0] > 0).count();
    count as f64 / total as f64
}

fn texture_descriptor(sample: &ImageSample, rescaled: &GrayImage) -> Result<TextureDescriptor> {
    let code_histogram = code_histogram(&neighbourhood_codes(sample)?);
    let (gradient_mean, gradient_std) = gradient_stats(rescaled)?;
    Ok(TextureDescriptor {
        code_histogram,
        gradient_mean,
        gradient_std,
    })
}

/// Per-pixel 8-bit neighbourhood codes in row-major order.
///
/// Border pixels keep code 0.
pub fn neighbourhood_codes(sample: &ImageSample) -> Result<Vec<u8>> {
    let (width, height) = (sample.width(), sample.height());
    if width < 3 || height < 3 {
        return Err(DetectionError::Extraction(format!(
            "{}x{} sample has no interior pixels",
            width, height
        )));
    }

    let mut codes = vec![0u8; sample.len()];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = sample.get(x, y);
            let mut code = 0u8;
            for (k, (dx, dy)) in NEIGHBOURS.iter().enumerate() {
                let neighbour = sample.get((x as i32 + dx) as u32, (y as i32 + dy) as u32);
                if neighbour >= center {
                    code |= 1 << k;
                }
            }
            codes[(y * width + x) as usize] = code;
        }
    }
    Ok(codes)
}

pub fn code_histogram(codes: &[u8]) -> Vec<u32> {
    let mut histogram = vec![0u32; CODE_BUCKETS];
    for &code in codes {
        histogram[code as usize] += 1;
    }
    histogram
}

/// Mean and population std of the 3x3 Sobel gradient magnitude
pub fn gradient_stats(gray: &GrayImage) -> Result<(f64, f64)> {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let magnitudes = gx.pixels().zip(gy.pixels()).map(|(dx, dy)| {
        let dx = dx[0] as f64;
        let dy = dy[0] as f64;
        (dx * dx + dy * dy).sqrt()
    });

    mean_std(magnitudes)
        .ok_or_else(|| DetectionError::Extraction("empty gradient map".into()))
}

/// Single-pass mean and population standard deviation
fn mean_std(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (count, sum, sum_sq) = values.fold((0usize, 0.0f64, 0.0f64), |(n, s, sq), v| {
        (n + 1, s + v, sq + v * v)
    });
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
    Some((mean, variance.sqrt()))
}
