use time::OffsetDateTime;

use crate::models::ClassificationStatus;

#[derive(Debug, Clone)]
pub struct Scan {
    pub id: i64,
    pub user_id: i64,
    /// Name the upload was stored under
    pub filename: String,
    pub original_filename: String,
    pub result: ClassificationStatus,
    pub confidence: f64,
    pub defect_count: u32,
    pub scanned_at: OffsetDateTime,
    pub notes: Option<String>,
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewScan {
    pub user_id: i64,
    pub filename: String,
    pub original_filename: String,
    pub result: ClassificationStatus,
    pub confidence: f64,
    pub defect_count: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub total: i64,
    pub defective: i64,
    pub non_defective: i64,
}

/// Scan counts for one calendar month, `month` formatted as YYYY-MM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyStats {
    pub month: String,
    pub total: i64,
    pub defective: i64,
    pub non_defective: i64,
}

pub trait ScanRepository {
    fn add_scan(&self, scan: &NewScan) -> impl Future<Output = anyhow::Result<Scan>>;
    /// Fetch a scan only if it belongs to `user_id`
    fn get_scan(&self, id: i64, user_id: i64) -> impl Future<Output = anyhow::Result<Option<Scan>>>;
    /// Most recent scans of a user, newest first
    fn recent_scans(
        &self,
        user_id: i64,
        limit: u32,
    ) -> impl Future<Output = anyhow::Result<Vec<Scan>>>;
    /// Counts for one user, or across all users when `user_id` is None
    fn scan_stats(&self, user_id: Option<i64>) -> impl Future<Output = anyhow::Result<ScanStats>>;
    /// Per-month counts, newest month first
    fn monthly_stats(&self, limit: u32) -> impl Future<Output = anyhow::Result<Vec<MonthlyStats>>>;
}
