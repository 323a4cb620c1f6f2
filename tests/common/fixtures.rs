#![allow(dead_code)]

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tempfile::NamedTempFile;
use xrayscan::core::db::{NewScan, NewUser, Role, ScanDb};
use xrayscan::ClassificationStatus;

/// Uniform grayscale image
pub fn flat_image(width: u32, height: u32, level: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([level]))
}

/// Black and white squares of `block` pixels
pub fn checkerboard(width: u32, height: u32, block: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if (x / block + y / block) % 2 == 0 {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// Reproducible uniform noise
pub fn noise_image(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.r#gen::<u8>()]))
}

/// Horizontal ramp from black to white
pub fn gradient_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / width.max(1)) as u8]))
}

/// Encode as PNG in memory
pub fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode test image");
    buf.into_inner()
}

/// Creates a 100x60 color test image on disk.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = RgbImage::from_fn(100, 60, |x, y| Rgb([(x * 2) as u8, (y * 4) as u8, 128u8]));
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Creates a ScanDb in a temporary directory.
/// Returns both the database and the temp directory (which must be kept alive).
pub async fn create_test_db() -> (ScanDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("test.db");
    let db = ScanDb::new(&path).await.expect("Failed to create test database");
    (db, dir)
}

pub fn make_new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: xrayscan::auth::hash_password_with_iterations("password", 1_000),
        role: Role::User,
    }
}

pub fn make_new_scan(user_id: i64, original: &str, result: ClassificationStatus) -> NewScan {
    NewScan {
        user_id,
        filename: format!("20240101_000000_{}", original),
        original_filename: original.to_string(),
        result,
        confidence: if result.is_defective() { 70.0 } else { 14.4 },
        defect_count: if result.is_defective() { 2 } else { 0 },
        notes: None,
    }
}
