//! Best-effort result notifications.

use std::sync::Arc;

use time::OffsetDateTime;
use time::macros::format_description;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::ClassificationStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Build the message sent to a user after a scan completes
    pub fn compose(
        recipient: &str,
        display_name: &str,
        status: ClassificationStatus,
        confidence: f64,
        filename: &str,
        at: OffsetDateTime,
    ) -> Self {
        let when = at
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
            .unwrap_or_default();

        let (headline, section, advice) = match status {
            ClassificationStatus::Defective => (
                "DEFECTIVE X-RAY DETECTED",
                "IMPORTANT NOTICE:\nThe analysis flagged potential abnormalities in your X-ray image.\n\
                 Please consult a qualified healthcare professional as soon as possible.",
                "NEXT STEPS:\n- Review the detailed result in your scan history\n\
                 - Download the report\n- Schedule an appointment with your healthcare provider",
            ),
            ClassificationStatus::NonDefective => (
                "NON-DEFECTIVE X-RAY",
                "No significant abnormalities were flagged in your X-ray image.",
                "RECOMMENDED ACTIONS:\n- Review the detailed result in your scan history\n\
                 - Share the report with your healthcare provider at your next consultation",
            ),
        };

        let body = format!(
            "Dear {name},\n\n\
             Your X-ray analysis has been completed.\n\n\
             ANALYSIS RESULTS:\n\
             - Status: {headline}\n\
             - Confidence: {confidence:.2}%\n\
             - Filename: {filename}\n\
             - Analysis Date: {when}\n\n\
             {section}\n\n\
             {advice}\n\n\
             DISCLAIMER:\n\
             This automated analysis is not a diagnosis and does not replace professional medical judgment.\n",
            name = display_name,
        );

        Self {
            recipient: recipient.to_string(),
            subject: format!("X-Ray Analysis Complete: {}", status.label()),
            body,
        }
    }
}

/// Delivers notifications. Implementations may block.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "Notification sent"
        );
        Ok(())
    }
}

/// Deliver in the background. Failures are logged and otherwise ignored;
/// callers are free to drop the handle.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = notifier.send(&notification) {
            warn!("Failed to notify {}: {}", notification.recipient, e);
        }
    })
}
