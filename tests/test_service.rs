//! Integration tests for the upload service.
//!
//! Tests cover:
//! - Anonymous uploads are classified and stored but not recorded
//! - Signed-in uploads are recorded and trigger a notification
//! - Defective uploads carry markers into the record and the notification
//! - Rejected uploads (missing name, disallowed type)
//! - Corrupt uploads degrade to the fallback result

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use xrayscan::notify::{Notification, Notifier};
use xrayscan::service::{ScanService, Upload, UploadError};

use common::*;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

impl RecordingNotifier {
    async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            {
                let sent = self.sent.lock().unwrap();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.sent.lock().unwrap().clone()
    }
}

async fn create_test_service(
    db: &ScanDb,
    dir: &tempfile::TempDir,
) -> (ScanService, Arc<RecordingNotifier>) {
    create_service_with_detector(DefectDetector::default(), db, dir).await
}

async fn create_service_with_detector(
    detector: DefectDetector,
    db: &ScanDb,
    dir: &tempfile::TempDir,
) -> (ScanService, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = ScanService::new(
        detector,
        db.clone(),
        dir.path().join("uploads"),
        notifier.clone(),
    )
    .await
    .expect("Failed to create scan service");
    (service, notifier)
}

#[tokio::test]
async fn test_anonymous_upload_is_not_saved() -> anyhow::Result<()> {
    let (db, temp_dir) = create_test_db().await;
    let (service, notifier) = create_test_service(&db, &temp_dir).await;

    let upload = Upload {
        filename: "chest xray.png".to_string(),
        bytes: png_bytes(&flat_image(64, 64, 128)),
    };
    let response = service.analyze_upload(upload, None).await?;

    assert_eq!(response.status, ClassificationStatus::NonDefective);
    assert!((response.confidence - 14.4).abs() < 1e-9);
    assert_eq!(response.defect_count, 0);
    assert!(!response.scan_saved);
    assert!(response.scan_id.is_none());
    assert!(response.stored_filename.ends_with("_chest_xray.png"));
    assert!(temp_dir.path().join("uploads").join(&response.stored_filename).is_file());

    assert_eq!(db.scan_stats(None).await?.total, 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(notifier.sent.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_signed_in_upload_is_saved_and_notified() -> anyhow::Result<()> {
    let (db, temp_dir) = create_test_db().await;
    let (service, notifier) = create_test_service(&db, &temp_dir).await;
    let user = db.add_user(&make_new_user("jane")).await?;

    let upload = Upload {
        filename: "wrist_fracture.jpg".to_string(),
        bytes: png_bytes(&flat_image(64, 64, 128)),
    };
    let response = service.analyze_upload(upload, Some(&user)).await?;

    assert!(response.scan_saved);
    let scan_id = response.scan_id.expect("scan id for saved scan");

    let scan = db.get_scan(scan_id, user.id).await?.expect("saved scan");
    assert_eq!(scan.original_filename, "wrist_fracture.jpg");
    assert_eq!(scan.filename, response.stored_filename);
    assert_eq!(scan.result, response.status);
    assert_eq!(scan.confidence, response.confidence);
    assert_eq!(scan.defect_count as usize, response.defect_count);
    assert!(scan.notes.is_none());

    let sent = notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "jane@example.com");
    assert!(sent[0].body.contains("wrist_fracture.jpg"));

    Ok(())
}

#[tokio::test]
async fn test_defective_upload_is_saved_with_markers_and_notified() -> anyhow::Result<()> {
    let (db, temp_dir) = create_test_db().await;
    let mut config = DetectorConfig::default();
    config.fusion.decision_threshold = 0.3;
    let (service, notifier) =
        create_service_with_detector(DefectDetector::new(config), &db, &temp_dir).await;
    let user = db.add_user(&make_new_user("jane")).await?;

    // Dark indicator plus a defect-only filename: (0.95 * 0.2 + 0.4 * 0.8) * 0.8 = 0.408
    let upload = Upload {
        filename: "fracture.png".to_string(),
        bytes: png_bytes(&flat_image(64, 64, 20)),
    };
    let response = service.analyze_upload(upload, Some(&user)).await?;

    assert_eq!(response.status, ClassificationStatus::Defective);
    assert!((response.confidence - 40.8).abs() < 1e-9);
    assert!((1..=3).contains(&response.defect_count));
    assert_eq!(response.defect_locations.len(), response.defect_count);
    for loc in &response.defect_locations {
        assert!(loc.x <= 100 && loc.y <= 100);
    }
    assert!(response.scan_saved);

    let scan = db
        .get_scan(response.scan_id.expect("saved"), user.id)
        .await?
        .expect("saved scan");
    assert_eq!(scan.result, ClassificationStatus::Defective);
    assert_eq!(scan.defect_count as usize, response.defect_count);
    assert_eq!(scan.confidence, response.confidence);
    assert!(scan.notes.is_none());

    let stats = db.scan_stats(Some(user.id)).await?;
    assert_eq!(stats.defective, 1);
    assert_eq!(stats.non_defective, 0);

    let sent = notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "jane@example.com");
    assert_eq!(sent[0].subject, "X-Ray Analysis Complete: Defective");
    assert!(sent[0].body.contains("DEFECTIVE X-RAY DETECTED"));
    assert!(sent[0].body.contains("Confidence: 40.80%"));
    assert!(sent[0].body.contains("fracture.png"));

    Ok(())
}

#[tokio::test]
async fn test_rejected_uploads() -> anyhow::Result<()> {
    let (db, temp_dir) = create_test_db().await;
    let (service, _notifier) = create_test_service(&db, &temp_dir).await;

    let missing = service
        .analyze_upload(Upload { filename: String::new(), bytes: Vec::new() }, None)
        .await;
    assert!(matches!(missing, Err(UploadError::MissingFile)));

    let unnamed = service
        .analyze_upload(Upload { filename: String::new(), bytes: vec![1, 2, 3] }, None)
        .await;
    assert!(matches!(unnamed, Err(UploadError::MissingFilename)));

    let wrong_type = service
        .analyze_upload(
            Upload {
                filename: "notes.txt".to_string(),
                bytes: b"hello".to_vec(),
            },
            None,
        )
        .await;
    assert!(matches!(wrong_type, Err(UploadError::InvalidType(_))));

    Ok(())
}

#[tokio::test]
async fn test_corrupt_upload_records_fallback() -> anyhow::Result<()> {
    let (db, temp_dir) = create_test_db().await;
    let (service, _notifier) = create_test_service(&db, &temp_dir).await;
    let user = db.add_user(&make_new_user("jane")).await?;

    let upload = Upload {
        filename: "tumor.png".to_string(),
        bytes: b"not really a png".to_vec(),
    };
    let response = service.analyze_upload(upload, Some(&user)).await?;

    assert_eq!(response.status, ClassificationStatus::NonDefective);
    assert_eq!(response.confidence, 50.0);
    assert!(response.defect_locations.is_empty());

    let scan = db
        .get_scan(response.scan_id.expect("saved"), user.id)
        .await?
        .expect("saved scan");
    assert!(scan.notes.unwrap_or_default().contains("Error processing image"));

    Ok(())
}
