//! `vidrelay fetch` – run one job in-process.

use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use vidrelay_core::config::RelayConfig;
use vidrelay_core::job::{FileSegment, JobRequest, SinkId, TerminalState};
use vidrelay_core::sink::OutboxSink;

use super::serve::{describe_result, start_queue};

pub async fn run_fetch(cfg: &RelayConfig, url: &str, sink: SinkId, force: bool) -> Result<()> {
    let (queue, mut results) = start_queue(cfg).await?;
    let mut req = JobRequest::new(sink, sink, url);
    if force {
        req = req.forced();
    }
    let id = queue.submit(req)?;
    queue.shutdown();

    let result = results
        .recv()
        .await
        .ok_or_else(|| anyhow!("queue stopped before job {} finished", id))?;
    queue.join().await;

    println!("{}", describe_result(&result));
    if result.state == TerminalState::Succeeded {
        let outbox = OutboxSink::new(cfg.outbox_dir()?);
        for (dest, f) in outbox_paths(&outbox, sink, &result.files).iter().zip(&result.files) {
            println!("  {} ({} bytes)", dest.display(), f.size);
        }
    }
    match result.state {
        TerminalState::Succeeded | TerminalState::SkippedDuplicate => Ok(()),
        other => bail!("job {} ended {}", id, other),
    }
}

/// Where the outbox put each delivered file; the job's own copies are gone.
fn outbox_paths(outbox: &OutboxSink, sink: SinkId, files: &[FileSegment]) -> Vec<PathBuf> {
    let dir = outbox.sink_dir(sink);
    files
        .iter()
        .filter_map(|f| f.path.file_name().map(|name| dir.join(name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn files_are_reported_under_the_sink_outbox() {
        let outbox = OutboxSink::new("/srv/outbox");
        let files: Vec<FileSegment> = ["part0.mp4", "part1.mp4"]
            .iter()
            .enumerate()
            .map(|(index, name)| FileSegment {
                index,
                path: Path::new("/tmp/jobs/job-1-x/parts").join(name),
                size: 10,
                start: Duration::ZERO,
                end: Duration::from_secs(30),
            })
            .collect();

        assert_eq!(
            outbox_paths(&outbox, -100500, &files),
            vec![
                PathBuf::from("/srv/outbox/-100500/part0.mp4"),
                PathBuf::from("/srv/outbox/-100500/part1.mp4"),
            ]
        );
    }
}
