//! `vidrelay purge` – forget one video's outcome for a sink.

use anyhow::Result;
use vidrelay_core::config::RelayConfig;
use vidrelay_core::dedup_db::DedupDb;
use vidrelay_core::source_id::{canonical_video_id, VideoKey};

/// Accepts either a URL or an already-canonical key.
pub(crate) fn video_key_arg(video: &str) -> VideoKey {
    canonical_video_id(video).unwrap_or_else(|| VideoKey::new(video.trim()))
}

pub async fn run_purge(cfg: &RelayConfig, sink: i64, video: &str) -> Result<()> {
    let db = DedupDb::open_at(cfg.dedup_db_path()?).await?;
    let key = video_key_arg(video);
    if db.purge(sink, &key).await? {
        println!("Purged {} for sink {}.", key, sink);
    } else {
        println!("No record of {} for sink {}.", key, sink);
    }
    Ok(())
}
