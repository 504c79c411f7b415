//! Record operations: lookup, upsert, list, purge.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, DedupDb};
use super::types::{Outcome, VideoRecord};
use crate::job::SinkId;
use crate::source_id::VideoKey;

fn record_from_row(row: &SqliteRow) -> VideoRecord {
    let video: String = row.get("video_id");
    let outcome: String = row.get("last_outcome");
    VideoRecord {
        sink: row.get("sink_id"),
        video: VideoKey::new(video),
        last_outcome: Outcome::from_str(&outcome),
        updated_at: row.get("updated_at"),
        attempt_count: row.get("attempt_count"),
        last_message: row.get("last_message"),
    }
}

impl DedupDb {
    /// Point lookup of the record for (sink, video).
    pub async fn lookup(&self, sink: SinkId, video: &VideoKey) -> Result<Option<VideoRecord>> {
        let row = sqlx::query(
            r#"
            SELECT sink_id, video_id, last_outcome, updated_at, attempt_count, last_message
            FROM processed_videos
            WHERE sink_id = ?1 AND video_id = ?2
            "#,
        )
        .bind(sink)
        .bind(video.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// Upsert the outcome of a finished run; the attempt count always goes up by one.
    pub async fn record(
        &self,
        sink: SinkId,
        video: &VideoKey,
        outcome: Outcome,
        message: Option<&str>,
    ) -> Result<VideoRecord> {
        let now = unix_timestamp();
        let row = sqlx::query(
            r#"
            INSERT INTO processed_videos (
                sink_id, video_id, last_outcome, updated_at, attempt_count, last_message
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5)
            ON CONFLICT (sink_id, video_id) DO UPDATE SET
                last_outcome = excluded.last_outcome,
                updated_at = excluded.updated_at,
                attempt_count = processed_videos.attempt_count + 1,
                last_message = excluded.last_message
            RETURNING sink_id, video_id, last_outcome, updated_at, attempt_count, last_message
            "#,
        )
        .bind(sink)
        .bind(video.as_str())
        .bind(outcome.as_str())
        .bind(now)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        let rec = record_from_row(&row);
        tracing::info!(
            sink,
            video = %video,
            outcome = outcome.as_str(),
            attempts = rec.attempt_count,
            "dedup record updated"
        );
        Ok(rec)
    }

    /// All records, most recently updated first.
    pub async fn list_records(&self) -> Result<Vec<VideoRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT sink_id, video_id, last_outcome, updated_at, attempt_count, last_message
            FROM processed_videos
            ORDER BY updated_at DESC, sink_id ASC, video_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Remove the record for (sink, video). Returns whether a row existed.
    ///
    /// The pipeline never deletes records; this is the manual purge.
    pub async fn purge(&self, sink: SinkId, video: &VideoKey) -> Result<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM processed_videos
            WHERE sink_id = ?1 AND video_id = ?2
            "#,
        )
        .bind(sink)
        .bind(video.as_str())
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }
}
