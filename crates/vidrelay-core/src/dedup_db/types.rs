//! Types used by the dedup database.

use crate::job::{SinkId, TerminalState};
use crate::source_id::VideoKey;

/// Last outcome stored for a (sink, video) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    TimedOut,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::TimedOut => "timed_out",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "succeeded" | "success" => Outcome::Succeeded,
            "timed_out" => Outcome::TimedOut,
            _ => Outcome::Failed,
        }
    }

    /// Outcome to persist for a terminal state; skipped and cancelled jobs leave no trace.
    pub fn for_state(state: TerminalState) -> Option<Self> {
        match state {
            TerminalState::Succeeded => Some(Outcome::Succeeded),
            TerminalState::Failed => Some(Outcome::Failed),
            TerminalState::TimedOut => Some(Outcome::TimedOut),
            TerminalState::SkippedDuplicate | TerminalState::Cancelled => None,
        }
    }
}

/// One row of `processed_videos`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub sink: SinkId,
    pub video: VideoKey,
    pub last_outcome: Outcome,
    /// Unix seconds of the last terminal outcome.
    pub updated_at: i64,
    pub attempt_count: i64,
    /// Failure message of the last run, if it failed.
    pub last_message: Option<String>,
}

impl VideoRecord {
    /// True when this record short-circuits a non-forced request.
    pub fn blocks_reprocessing(&self) -> bool {
        self.last_outcome == Outcome::Succeeded
    }
}
