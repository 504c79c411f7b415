//! `vidrelay serve` – run the queue worker behind the control socket.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use vidrelay_core::access::AccessPolicy;
use vidrelay_core::command::check_program;
use vidrelay_core::config::RelayConfig;
use vidrelay_core::dedup_db::DedupDb;
use vidrelay_core::job::JobResult;
use vidrelay_core::orchestrator::Orchestrator;
use vidrelay_core::queue::{QueueOptions, TaskQueue};
use vidrelay_core::sink::{DeliverySink, OutboxSink, RetryPolicy, RetryingSink};

use crate::cli::control_socket::{self, ControlState};

/// One-line summary of a finished job.
pub fn describe_result(r: &JobResult) -> String {
    let video = r
        .video
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    match &r.failure {
        Some(f) => format!(
            "job {} {} ({}) for sink {}: {}",
            r.job_id, r.state, video, r.sink, f.message
        ),
        None => format!(
            "job {} {} ({}) for sink {}: {} file(s) in {:.1}s",
            r.job_id,
            r.state,
            video,
            r.sink,
            r.files.len(),
            r.duration.as_secs_f64()
        ),
    }
}

/// Outbox delivery with the configured retry policy.
pub(crate) fn outbox_sink(cfg: &RelayConfig) -> Result<Arc<dyn DeliverySink>> {
    let outbox = OutboxSink::new(cfg.outbox_dir()?);
    let sink: Arc<dyn DeliverySink> = Arc::new(RetryingSink::new(
        outbox,
        RetryPolicy::from_config(&cfg.delivery),
    ));
    Ok(sink)
}

/// Production pipeline (yt-dlp, ffmpeg, outbox) behind a started queue.
pub(crate) async fn start_queue(
    cfg: &RelayConfig,
) -> Result<(TaskQueue, UnboundedReceiver<JobResult>)> {
    for program in [
        &cfg.fetcher.ytdlp_program,
        &cfg.splitter.ffmpeg_program,
        &cfg.splitter.ffprobe_program,
    ] {
        if let Err(e) = check_program(program) {
            tracing::warn!("{}", e);
            eprintln!("warning: {}", e);
        }
    }
    let db = DedupDb::open_at(cfg.dedup_db_path()?).await?;
    let orchestrator = Arc::new(Orchestrator::from_config(cfg, db, outbox_sink(cfg)?)?);
    Ok(TaskQueue::start(orchestrator, QueueOptions::from(&cfg.queue)))
}

pub async fn run_serve(cfg: &RelayConfig, socket_path: &Path) -> Result<()> {
    let (queue, mut results) = start_queue(cfg).await?;
    let state = Arc::new(ControlState::new(
        queue.clone(),
        AccessPolicy::from_config(&cfg.access),
    ));
    let listener = control_socket::spawn_control_listener(state, socket_path)?;
    tracing::info!(path = %socket_path.display(), "control socket listening");
    println!(
        "Serving; control socket at {}. Press Ctrl-C to stop.",
        socket_path.display()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            Some(r) = results.recv() => println!("{}", describe_result(&r)),
            res = &mut ctrl_c => {
                res.context("waiting for Ctrl-C")?;
                break;
            }
        }
    }

    listener.abort();
    let _ = std::fs::remove_file(socket_path);
    println!("Shutting down; finishing {} job(s).", queue.len());
    queue.shutdown();

    let drained = queue.join();
    tokio::pin!(drained);
    loop {
        tokio::select! {
            Some(r) = results.recv() => println!("{}", describe_result(&r)),
            () = &mut drained => break,
        }
    }
    while let Ok(r) = results.try_recv() {
        println!("{}", describe_result(&r));
    }
    tracing::info!("serve stopped");
    Ok(())
}
