//! Delivery sinks.
//!
//! The pipeline only needs one operation from the delivery side: hand a file
//! to a chat or channel. `RetryingSink` adds transient-error backoff on top of
//! any sink; `OutboxSink` is the local implementation used by the CLI.

mod outbox;
mod retry;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::SinkError;
use crate::job::SinkId;

pub use outbox::OutboxSink;
pub use retry::{classify, ErrorKind, RetryDecision, RetryPolicy, RetryingSink};

/// One file handed to a sink, with its position in the job's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFile {
    pub path: PathBuf,
    /// Zero-based position in the job's output.
    pub index: usize,
    pub total: usize,
    pub caption: Option<String>,
}

impl DeliveryFile {
    /// Build the descriptor for part `index` of `total`, captioning multi-part output as `title (i/N)`.
    pub fn new(path: PathBuf, index: usize, total: usize, title: Option<&str>) -> Self {
        let caption = match (title, total) {
            (Some(t), 1) => Some(t.to_string()),
            (Some(t), n) => Some(format!("{} ({}/{})", t, index + 1, n)),
            (None, 1) => None,
            (None, n) => Some(format!("part {}/{}", index + 1, n)),
        };
        Self {
            path,
            index,
            total,
            caption,
        }
    }
}

/// Destination that accepts produced files, one at a time, in order.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(&self, sink: SinkId, file: &DeliveryFile) -> Result<(), SinkError>;
}
