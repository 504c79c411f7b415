//! The worker loop: one job at a time, each under the wall-clock budget.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinError;

use super::{JobExecutor, QueueOptions, Shared, Slot};
use crate::error::PipelineError;
use crate::job::JobResult;

pub(super) async fn run(shared: Arc<Shared>, executor: Arc<dyn JobExecutor>, opts: QueueOptions) {
    loop {
        let next = {
            let mut st = shared.lock();
            match st.pending.pop_front() {
                Some(slot) => {
                    let job = slot.job.clone();
                    st.running = Some(Slot {
                        job: slot.job,
                        video: slot.video,
                        since: Instant::now(),
                    });
                    Some(job)
                }
                None if st.closed => break,
                None => None,
            }
        };

        let Some(job) = next else {
            shared.wake.notified().await;
            continue;
        };

        tracing::info!(job_id = job.id, url = %job.url, "job started");
        let started = Instant::now();
        let mut task = {
            let executor = Arc::clone(&executor);
            let job = job.clone();
            tokio::spawn(async move { executor.execute(&job).await })
        };
        let result = match tokio::time::timeout(opts.job_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                let elapsed = started.elapsed();
                let msg = panic_message(e);
                tracing::error!(job_id = job.id, error = %msg, "job panicked");
                let err = PipelineError::Panicked(msg);
                JobResult::from_error(&job, None, Vec::new(), &err, elapsed)
            }
            Err(_) => {
                // Dropping the execute future kills any running tool process
                // group and removes the job's scratch directory; wait for it.
                task.abort();
                let _ = task.await;
                let elapsed = started.elapsed();
                tracing::warn!(
                    job_id = job.id,
                    budget_secs = opts.job_timeout.as_secs(),
                    "job timed out, terminated"
                );
                executor.on_timeout(&job, elapsed).await
            }
        };
        tracing::info!(
            job_id = job.id,
            state = %result.state,
            duration_ms = result.duration.as_millis() as u64,
            "job finished"
        );

        shared.lock().running = None;
        shared.report(result);
    }
    tracing::info!("queue worker drained, exiting");
}

fn panic_message(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
