//! `vidrelay history` – list recorded outcomes.

use anyhow::Result;
use vidrelay_core::config::RelayConfig;
use vidrelay_core::dedup_db::DedupDb;

pub async fn run_history(cfg: &RelayConfig) -> Result<()> {
    let db = DedupDb::open_at(cfg.dedup_db_path()?).await?;
    let records = db.list_records().await?;
    if records.is_empty() {
        println!("No videos recorded.");
        return Ok(());
    }
    println!(
        "{:<14} {:<10} {:<8} {:<12} {}",
        "SINK", "OUTCOME", "TRIES", "UPDATED", "VIDEO"
    );
    for r in records {
        println!(
            "{:<14} {:<10} {:<8} {:<12} {}",
            r.sink,
            r.last_outcome.as_str(),
            r.attempt_count,
            r.updated_at,
            r.video
        );
        if let Some(msg) = r.last_message {
            println!("    {}", msg);
        }
    }
    Ok(())
}
