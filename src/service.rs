//! Upload boundary: store the file, classify it, record the scan and notify the owner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::fs as async_fs;
use tracing::{info, warn};

use crate::core::db::{NewScan, ScanDb, ScanRepository, User};
use crate::detection::{DefectDetector, ImageSource};
use crate::models::{ClassificationStatus, DefectLocation};
use crate::notify::{self, Notification, Notifier};

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "dcm", "dicom"];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file part")]
    MissingFile,

    #[error("No selected file")]
    MissingFilename,

    #[error("Invalid file type: {0}")]
    InvalidType(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub status: ClassificationStatus,
    pub confidence: f64,
    pub defect_locations: Vec<DefectLocation>,
    pub defect_count: usize,
    pub scan_saved: bool,
    pub scan_id: Option<i64>,
    /// Stored name of the upload inside the upload directory
    pub stored_filename: String,
}

pub struct ScanService {
    detector: Arc<DefectDetector>,
    db: ScanDb,
    upload_dir: PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl ScanService {
    pub async fn new<P: AsRef<Path>>(
        detector: DefectDetector,
        db: ScanDb,
        upload_dir: P,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let upload_dir = upload_dir.as_ref().to_path_buf();
        async_fs::create_dir_all(&upload_dir)
            .await
            .with_context(|| format!("Failed to create upload directory {:?}", upload_dir))?;
        Ok(Self {
            detector: Arc::new(detector),
            db,
            upload_dir,
            notifier,
        })
    }

    pub fn db(&self) -> &ScanDb {
        &self.db
    }

    /// Handle one upload. Only a signed-in `user` gets the scan saved and a notification.
    pub async fn analyze_upload(
        &self,
        upload: Upload,
        user: Option<&User>,
    ) -> Result<AnalysisResponse, UploadError> {
        if upload.bytes.is_empty() && upload.filename.is_empty() {
            return Err(UploadError::MissingFile);
        }
        if upload.filename.is_empty() {
            return Err(UploadError::MissingFilename);
        }
        if !allowed_file(&upload.filename) {
            return Err(UploadError::InvalidType(upload.filename));
        }

        let stored_filename = stored_filename(&upload.filename, OffsetDateTime::now_utc())?;
        let dest_path = self.upload_dir.join(&stored_filename);
        async_fs::write(&dest_path, &upload.bytes)
            .await
            .with_context(|| format!("Failed to store upload at {:?}", dest_path))?;

        let detector = self.detector.clone();
        let original_filename = upload.filename.clone();
        let bytes = upload.bytes;
        let result = tokio::task::spawn_blocking(move || {
            detector.detect(&ImageSource::bytes(&bytes), Some(&original_filename))
        })
        .await
        .context("Detection task panicked")?;

        if let Some(error) = &result.error {
            warn!("Upload {} analyzed with fallback: {}", upload.filename, error);
        }

        let mut scan_id = None;
        if let Some(user) = user {
            let scan = self
                .db
                .add_scan(&NewScan {
                    user_id: user.id,
                    filename: stored_filename.clone(),
                    original_filename: upload.filename.clone(),
                    result: result.status,
                    confidence: result.confidence,
                    defect_count: result.defect_count() as u32,
                    notes: result.error.clone(),
                })
                .await?;
            info!(scan_id = scan.id, user = %user.username, status = %scan.result, "Scan saved");
            scan_id = Some(scan.id);

            notify::dispatch(
                self.notifier.clone(),
                Notification::compose(
                    &user.email,
                    &user.username,
                    result.status,
                    result.confidence,
                    &upload.filename,
                    scan.scanned_at,
                ),
            );
        }

        Ok(AnalysisResponse {
            status: result.status,
            confidence: result.confidence,
            defect_count: result.defect_count(),
            defect_locations: result.defect_locations,
            scan_saved: scan_id.is_some(),
            scan_id,
            stored_filename,
        })
    }
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied name to a safe single path component
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// Timestamp-prefixed name the upload is stored under
pub fn stored_filename(original: &str, at: OffsetDateTime) -> anyhow::Result<String> {
    let prefix = at.format(format_description!(
        "[year][month][day]_[hour][minute][second]_"
    ))?;
    let name = sanitize_filename(original);
    let name = if name.is_empty() { "upload".to_string() } else { name };
    Ok(format!("{}{}", prefix, name))
}
