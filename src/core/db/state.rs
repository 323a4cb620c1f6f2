use std::path::{Path, PathBuf};

use anyhow::Context;
use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

/// Second-resolution UTC timestamps sort lexicographically in SQL
const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

pub(super) struct DbState {
    db_file: PathBuf,
    pool: SqlitePool,
}

impl std::fmt::Debug for DbState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbState")
            .field("db_file", &self.db_file)
            .finish()
    }
}

impl DbState {
    pub(super) async fn new<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        let db_file = db_file.as_ref().to_path_buf();

        if let Some(parent) = db_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                anyhow::bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(&db_file)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await
            .with_context(|| format!("Failed to open database {:?}", db_file))?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { db_file, pool })
    }

    pub(super) async fn conn(&self) -> anyhow::Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub(super) async fn close(&self) {
        self.pool.close().await;
    }
}

pub(super) fn now_timestamp() -> anyhow::Result<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

pub(super) fn format_timestamp(at: OffsetDateTime) -> anyhow::Result<String> {
    Ok(at.to_offset(time::UtcOffset::UTC).format(TIMESTAMP_FORMAT)?)
}

pub(super) fn parse_timestamp(value: &str) -> anyhow::Result<OffsetDateTime> {
    let parsed = time::PrimitiveDateTime::parse(value, TIMESTAMP_FORMAT)
        .with_context(|| format!("Malformed timestamp in database: {}", value))?;
    Ok(parsed.assume_utc())
}
