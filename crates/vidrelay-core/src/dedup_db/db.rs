//! SQLite-backed dedup database implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Record CRUD lives in `records`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed dedup database.
///
/// Only the queue worker writes; introspection commands may read concurrently.
/// Every read and upsert is a single statement, so a reader never sees a
/// half-written record.
#[derive(Clone)]
pub struct DedupDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl DedupDb {
    /// Open (or create) the default database under the XDG state dir.
    pub async fn open_default() -> Result<Self> {
        let db_path = crate::config::state_dir()?.join("dedup.db");
        Self::open_at(db_path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = DedupDb { pool };
        db.migrate().await?;
        tracing::debug!(path = %path.display(), "dedup db opened");
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // One row per (sink, video). `last_message` keeps the failure text of
        // the last run for the history view.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_videos (
                sink_id INTEGER NOT NULL,
                video_id TEXT NOT NULL,
                last_outcome TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                last_message TEXT,
                PRIMARY KEY (sink_id, video_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for DB timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<DedupDb> {
    // Single connection to avoid in-memory pool handing back a different empty DB.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = DedupDb { pool };
    db.migrate().await?;
    Ok(db)
}
