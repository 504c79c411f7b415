//! Single-worker FIFO task queue.
//!
//! `TaskQueue` is a cheap-to-clone handle. Front ends call `submit`, `cancel`
//! and `snapshot` concurrently; none of them waits on the running job. Exactly
//! one worker task pops jobs in submission order and runs them under the
//! per-job wall-clock timeout. Terminal results arrive on the receiver
//! returned by `TaskQueue::start`.

mod worker;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::config::QueueConfig;
use crate::error::PipelineError;
use crate::job::{Job, JobId, JobRequest, JobResult, RequesterId, SinkId};
use crate::source_id::{canonical_video_id, VideoKey};

/// Work performed for each dequeued job.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    /// Run the job to completion. The future is dropped if the job times out.
    async fn execute(&self, job: &Job) -> JobResult;

    /// Build (and persist) the result of a job that hit its timeout.
    async fn on_timeout(&self, job: &Job, elapsed: Duration) -> JobResult;
}

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub job_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for QueueOptions {
    fn from(cfg: &QueueConfig) -> Self {
        Self {
            job_timeout: cfg.job_timeout(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is shutting down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Queued,
    Running,
}

impl EntryState {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Queued => "queued",
            EntryState::Running => "running",
        }
    }
}

/// One line of the introspection snapshot.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: JobId,
    pub state: EntryState,
    /// Time since start for the running job, since submission for queued ones.
    pub elapsed: Duration,
    pub requester: RequesterId,
    pub sink: SinkId,
    pub url: String,
    pub video: Option<VideoKey>,
}

struct Slot {
    job: Job,
    video: Option<VideoKey>,
    since: Instant,
}

impl Slot {
    fn entry(&self, state: EntryState) -> QueueEntry {
        QueueEntry {
            id: self.job.id,
            state,
            elapsed: self.since.elapsed(),
            requester: self.job.requester,
            sink: self.job.sink,
            url: self.job.url.clone(),
            video: self.video.clone(),
        }
    }
}

#[derive(Default)]
struct State {
    pending: VecDeque<Slot>,
    running: Option<Slot>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Notify,
    next_id: AtomicU64,
    results: mpsc::UnboundedSender<JobResult>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, result: JobResult) {
        if self.results.send(result).is_err() {
            tracing::debug!("result receiver dropped; discarding job result");
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TaskQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(
        executor: Arc<dyn JobExecutor>,
        opts: QueueOptions,
    ) -> (Self, mpsc::UnboundedReceiver<JobResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            wake: Notify::new(),
            next_id: AtomicU64::new(1),
            results: tx,
        });
        let handle = tokio::spawn(worker::run(shared.clone(), executor, opts));
        let queue = TaskQueue {
            shared,
            worker: Arc::new(Mutex::new(Some(handle))),
        };
        (queue, rx)
    }

    /// Append a job to the FIFO. Never waits on the running job.
    pub fn submit(&self, req: JobRequest) -> Result<JobId, QueueError> {
        let video = canonical_video_id(&req.url);
        let mut st = self.shared.lock();
        if st.closed {
            return Err(QueueError::Closed);
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let job = Job::from_request(id, req);
        tracing::info!(
            job_id = id,
            requester = job.requester,
            sink = job.sink,
            url = %job.url,
            position = st.pending.len() + usize::from(st.running.is_some()),
            "job queued"
        );
        st.pending.push_back(Slot {
            job,
            video,
            since: Instant::now(),
        });
        drop(st);
        self.shared.wake.notify_one();
        Ok(id)
    }

    /// Withdraw a job that has not started. Returns false if it is running,
    /// finished or unknown. A withdrawn job reports `Cancelled`.
    pub fn cancel(&self, id: JobId) -> bool {
        let slot = {
            let mut st = self.shared.lock();
            let Some(pos) = st.pending.iter().position(|s| s.job.id == id) else {
                return false;
            };
            st.pending.remove(pos)
        };
        let Some(slot) = slot else {
            return false;
        };
        tracing::info!(job_id = id, "job cancelled before start");
        self.shared.report(JobResult::from_error(
            &slot.job,
            slot.video,
            Vec::new(),
            &PipelineError::Cancelled,
            slot.since.elapsed(),
        ));
        true
    }

    /// Running job first, then queued jobs in execution order.
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        let st = self.shared.lock();
        st.running
            .iter()
            .map(|s| s.entry(EntryState::Running))
            .chain(st.pending.iter().map(|s| s.entry(EntryState::Queued)))
            .collect()
    }

    /// Id of a queued or running job for the same (sink, video), if any.
    pub fn active_job_for(&self, sink: SinkId, video: &VideoKey) -> Option<JobId> {
        let st = self.shared.lock();
        st.running
            .iter()
            .chain(st.pending.iter())
            .find(|s| s.job.sink == sink && s.video.as_ref() == Some(video))
            .map(|s| s.job.id)
    }

    pub fn len(&self) -> usize {
        let st = self.shared.lock();
        st.pending.len() + usize::from(st.running.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting submissions; the worker exits once the FIFO is drained.
    pub fn shutdown(&self) {
        self.shared.lock().closed = true;
        self.shared.wake.notify_one();
        tracing::info!("queue shutting down");
    }

    /// Wait for the worker to exit (after `shutdown`).
    pub async fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("queue worker ended abnormally: {}", e);
            }
        }
    }
}
