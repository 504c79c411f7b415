//! Error types for the pipeline stages.
//!
//! Each external collaborator gets its own error enum so callers can classify
//! failures (retry a sink hand-off, surface a tool diagnostic, ...). The
//! orchestrator folds them into `PipelineError`, which maps 1:1 onto a job's
//! terminal state.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Longest diagnostic kept on an error; tool stderr can be huge.
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// Trim a tool diagnostic to a bounded, printable size.
pub fn truncate_diagnostic(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
    out.push_str("...");
    out
}

/// Failure of the subprocess layer itself (not of the tool's work).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("program not found: {0}")]
    NotFound(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {elapsed:?}")]
    TimedOut { program: String, elapsed: Duration },

    #[error("io error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("retrieval tool failed (exit {exit_code:?}): {diagnostic}")]
    ToolFailed {
        diagnostic: String,
        exit_code: Option<i32>,
    },

    #[error("age-restricted video needs valid cookies: {diagnostic}")]
    AgeRestricted { diagnostic: String },

    #[error("malformed retrieval tool output: {0}")]
    MalformedOutput(String),

    #[error("no viable quality")]
    NoViableQuality,

    #[error("downloaded file is missing or too small: {0}")]
    FileMissing(PathBuf),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Classify a non-zero tool exit by its diagnostic text.
    pub fn from_tool(stderr: &str, exit_code: Option<i32>) -> Self {
        let diagnostic = truncate_diagnostic(stderr);
        if diagnostic.contains("Sign in to confirm your age") {
            FetchError::AgeRestricted { diagnostic }
        } else {
            FetchError::ToolFailed {
                diagnostic,
                exit_code,
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("could not probe source: {0}")]
    ProbeFailed(String),

    #[error("transcoder failed on segment {index} (exit {exit_code:?}): {diagnostic}")]
    TranscoderFailed {
        index: usize,
        diagnostic: String,
        exit_code: Option<i32>,
    },

    #[error("cannot plan segments: {0}")]
    InvalidPlan(String),

    #[error("segment {index} is {size} bytes, over the {ceiling} byte ceiling")]
    OversizedSegment { index: usize, size: u64, ceiling: u64 },

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink throttled the hand-off (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    #[error("sink hand-off timed out")]
    Timeout,

    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("sink rejected the file: {0}")]
    Rejected(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal failure of one job, grouped the way results are reported.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported or invalid source url: {0}")]
    InvalidSource(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("split failed: {0}")]
    Split(#[from] SplitError),

    #[error("delivery failed after {delivered}/{total} file(s): {source}")]
    Sink {
        delivered: usize,
        total: usize,
        #[source]
        source: SinkError,
    },

    #[error("job exceeded its {0:?} budget")]
    Timeout(Duration),

    #[error("job withdrawn before start")]
    Cancelled,

    #[error("dedup store: {0}")]
    Store(#[source] anyhow::Error),

    #[error("job panicked: {0}")]
    Panicked(String),
}
