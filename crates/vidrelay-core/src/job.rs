//! Job, result and segment types shared by the queue and the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::error::PipelineError;
use crate::source_id::VideoKey;

/// Job identifier (unique per submission within one queue).
pub type JobId = u64;

/// Identity of whoever asked for the job (a chat user id).
pub type RequesterId = i64;

/// Identity of the delivery destination (chat or channel id).
pub type SinkId = i64;

/// What a front end hands to `TaskQueue::submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub requester: RequesterId,
    pub url: String,
    pub sink: SinkId,
    /// Bypass the dedup short-circuit.
    pub force_redownload: bool,
}

impl JobRequest {
    pub fn new(requester: RequesterId, sink: SinkId, url: impl Into<String>) -> Self {
        Self {
            requester,
            url: url.into(),
            sink,
            force_redownload: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force_redownload = true;
        self
    }
}

/// An accepted submission. Immutable once created.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub requester: RequesterId,
    pub url: String,
    pub sink: SinkId,
    pub submitted_at: SystemTime,
    pub force_redownload: bool,
}

impl Job {
    pub(crate) fn from_request(id: JobId, req: JobRequest) -> Self {
        Self {
            id,
            requester: req.requester,
            url: req.url,
            sink: req.sink,
            submitted_at: SystemTime::now(),
            force_redownload: req.force_redownload,
        }
    }
}

/// One output file, in source-timeline order.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSegment {
    /// Zero-based sequence index.
    pub index: usize,
    pub path: PathBuf,
    pub size: u64,
    /// Offset of the first frame in the source timeline.
    pub start: Duration,
    /// Offset of the last frame in the source timeline.
    pub end: Duration,
}

impl FileSegment {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Final state of a job as reported through `JobResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Succeeded,
    Failed,
    TimedOut,
    /// A previous run for the same (sink, video) already succeeded.
    SkippedDuplicate,
    /// Withdrawn before the worker picked it up.
    Cancelled,
}

impl TerminalState {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalState::Succeeded => "succeeded",
            TerminalState::Failed => "failed",
            TerminalState::TimedOut => "timed_out",
            TerminalState::SkippedDuplicate => "skipped_duplicate",
            TerminalState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy carried on a failed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidSource,
    Fetch,
    NoViableQuality,
    Split,
    Sink,
    Timeout,
    Cancelled,
    Store,
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&PipelineError> for JobFailure {
    fn from(e: &PipelineError) -> Self {
        use crate::error::FetchError;
        let kind = match e {
            PipelineError::InvalidSource(_) => FailureKind::InvalidSource,
            PipelineError::Fetch(FetchError::NoViableQuality) => FailureKind::NoViableQuality,
            PipelineError::Fetch(_) => FailureKind::Fetch,
            PipelineError::Split(_) => FailureKind::Split,
            PipelineError::Sink { .. } => FailureKind::Sink,
            PipelineError::Timeout(_) => FailureKind::Timeout,
            PipelineError::Cancelled => FailureKind::Cancelled,
            PipelineError::Store(_) => FailureKind::Store,
            PipelineError::Panicked(_) => FailureKind::Panicked,
        };
        JobFailure {
            kind,
            message: e.to_string(),
        }
    }
}

/// Terminal report for one job. Consumed once by the reporter.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: JobId,
    pub sink: SinkId,
    pub video: Option<VideoKey>,
    pub state: TerminalState,
    /// Files handed to the sink, in order. Paths are gone by the time this is read.
    pub files: Vec<FileSegment>,
    pub failure: Option<JobFailure>,
    pub duration: Duration,
}

impl JobResult {
    pub fn succeeded(job: &Job, video: VideoKey, files: Vec<FileSegment>, duration: Duration) -> Self {
        Self {
            job_id: job.id,
            sink: job.sink,
            video: Some(video),
            state: TerminalState::Succeeded,
            files,
            failure: None,
            duration,
        }
    }

    pub fn skipped(job: &Job, video: VideoKey, duration: Duration) -> Self {
        Self {
            job_id: job.id,
            sink: job.sink,
            video: Some(video),
            state: TerminalState::SkippedDuplicate,
            files: Vec::new(),
            failure: None,
            duration,
        }
    }

    /// Result for a job that ended with `err`; the state follows the error kind.
    pub fn from_error(
        job: &Job,
        video: Option<VideoKey>,
        files: Vec<FileSegment>,
        err: &PipelineError,
        duration: Duration,
    ) -> Self {
        let state = match err {
            PipelineError::Timeout(_) => TerminalState::TimedOut,
            PipelineError::Cancelled => TerminalState::Cancelled,
            _ => TerminalState::Failed,
        };
        Self {
            job_id: job.id,
            sink: job.sink,
            video,
            state,
            files,
            failure: Some(JobFailure::from(err)),
            duration,
        }
    }
}
