mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from xrayscan for tests
pub use xrayscan::core::db::{
    MonthlyStats, NewScan, NewUser, Role, Scan, ScanDb, ScanRepository, ScanStats, User,
    UserRepository, UserSummary,
};
pub use xrayscan::{ClassificationStatus, DefectDetector, DetectorConfig, ImageSource};
