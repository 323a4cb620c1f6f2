mod scan;
mod state;
mod user;

use std::{path::Path, sync::Arc};

use sqlx::FromRow;
use state::DbState;

pub use scan::{MonthlyStats, NewScan, Scan, ScanRepository, ScanStats};
pub use user::{NewUser, Role, User, UserRepository, UserSummary};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@xrayscan.local";

/// Handle to the users/scans database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScanDb {
    state: Arc<DbState>,
}

impl ScanDb {
    /// Open (creating if needed) the database file and apply migrations
    pub async fn new<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(DbState::new(db_file).await?),
        })
    }

    pub async fn close(&self) {
        self.state.close().await;
    }

    /// Create the `admin` account unless it exists. Returns the account and whether it was created.
    pub async fn ensure_admin(&self, password_hash: &str) -> anyhow::Result<(User, bool)> {
        if let Some(existing) = self.find_user_by_login(ADMIN_USERNAME).await? {
            return Ok((existing, false));
        }
        let admin = self
            .add_user(&NewUser {
                username: ADMIN_USERNAME.to_string(),
                email: ADMIN_EMAIL.to_string(),
                password_hash: password_hash.to_string(),
                role: Role::Admin,
            })
            .await?;
        Ok((admin, true))
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: Role::try_from(row.role.as_str())?,
            created_at: state::parse_timestamp(&row.created_at)?,
            _guard: (),
        })
    }
}

#[derive(FromRow)]
struct UserSummaryRow {
    id: i64,
    username: String,
    email: String,
    role: String,
    created_at: String,
    scan_count: i64,
}

#[derive(FromRow)]
struct ScanRow {
    id: i64,
    user_id: i64,
    filename: String,
    original_filename: String,
    result: String,
    confidence: f64,
    defect_count: i64,
    scanned_at: String,
    notes: Option<String>,
}

impl TryFrom<ScanRow> for Scan {
    type Error = anyhow::Error;

    fn try_from(row: ScanRow) -> Result<Self, Self::Error> {
        Ok(Scan {
            id: row.id,
            user_id: row.user_id,
            filename: row.filename,
            original_filename: row.original_filename,
            result: row.result.as_str().try_into()?,
            confidence: row.confidence,
            defect_count: row.defect_count.try_into()?,
            scanned_at: state::parse_timestamp(&row.scanned_at)?,
            notes: row.notes,
            _guard: (),
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";
const SCAN_COLUMNS: &str =
    "id, user_id, filename, original_filename, result, confidence, defect_count, scanned_at, notes";

impl UserRepository for ScanDb {
    async fn add_user(&self, user: &NewUser) -> anyhow::Result<User> {
        let mut conn = self.state.conn().await?;
        let created_at = state::now_timestamp()?;
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (username, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                anyhow::anyhow!("Username or email already exists")
            } else {
                anyhow::Error::from(e)
            }
        })?;
        row.try_into()
    }

    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let mut conn = self.state.conn().await?;
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_login(&self, login: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.state.conn().await?;
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1
            ORDER BY username = $1 DESC LIMIT 1"
        ))
        .bind(login)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users_with_scan_counts(&self) -> anyhow::Result<Vec<UserSummary>> {
        let mut conn = self.state.conn().await?;
        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            r#"SELECT u.id, u.username, u.email, u.role, u.created_at,
                COUNT(s.id) AS scan_count
            FROM users u
            LEFT JOIN scans s ON u.id = s.user_id
            GROUP BY u.id
            ORDER BY u.created_at DESC, u.id DESC"#,
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(UserSummary {
                    id: row.id,
                    username: row.username,
                    email: row.email,
                    role: Role::try_from(row.role.as_str())?,
                    created_at: state::parse_timestamp(&row.created_at)?,
                    scan_count: row.scan_count,
                    _guard: (),
                })
            })
            .collect()
    }
}

impl ScanRepository for ScanDb {
    async fn add_scan(&self, scan: &NewScan) -> anyhow::Result<Scan> {
        let mut conn = self.state.conn().await?;
        let scanned_at = state::now_timestamp()?;
        let row: ScanRow = sqlx::query_as(&format!(
            "INSERT INTO scans
                (user_id, filename, original_filename, result, confidence, defect_count, scanned_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {SCAN_COLUMNS}"
        ))
        .bind(scan.user_id)
        .bind(&scan.filename)
        .bind(&scan.original_filename)
        .bind(scan.result.as_str())
        .bind(scan.confidence)
        .bind(scan.defect_count as i64)
        .bind(&scanned_at)
        .bind(&scan.notes)
        .fetch_one(&mut *conn)
        .await?;
        row.try_into()
    }

    async fn get_scan(&self, id: i64, user_id: i64) -> anyhow::Result<Option<Scan>> {
        let mut conn = self.state.conn().await?;
        let row: Option<ScanRow> = sqlx::query_as(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Scan::try_from).transpose()
    }

    async fn recent_scans(&self, user_id: i64, limit: u32) -> anyhow::Result<Vec<Scan>> {
        let mut conn = self.state.conn().await?;
        let rows: Vec<ScanRow> = sqlx::query_as(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans WHERE user_id = $1
            ORDER BY scanned_at DESC, id DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(Scan::try_from).collect()
    }

    async fn scan_stats(&self, user_id: Option<i64>) -> anyhow::Result<ScanStats> {
        let mut conn = self.state.conn().await?;
        let (total, defective, non_defective): (i64, i64, i64) = sqlx::query_as(
            r#"SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN result = 'defective' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN result = 'non-defective' THEN 1 ELSE 0 END), 0)
            FROM scans
            WHERE $1 IS NULL OR user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(ScanStats {
            total,
            defective,
            non_defective,
        })
    }

    async fn monthly_stats(&self, limit: u32) -> anyhow::Result<Vec<MonthlyStats>> {
        let mut conn = self.state.conn().await?;
        let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
            r#"SELECT
                substr(scanned_at, 1, 7) AS month,
                COUNT(*),
                SUM(CASE WHEN result = 'defective' THEN 1 ELSE 0 END),
                SUM(CASE WHEN result = 'non-defective' THEN 1 ELSE 0 END)
            FROM scans
            GROUP BY month
            ORDER BY month DESC
            LIMIT $1"#,
        )
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(month, total, defective, non_defective)| MonthlyStats {
                month,
                total,
                defective,
                non_defective,
            })
            .collect())
    }
}
