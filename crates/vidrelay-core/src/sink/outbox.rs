//! Local sink: copies delivered files into `<root>/<sink id>/`.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{DeliveryFile, DeliverySink};
use crate::error::SinkError;
use crate::job::SinkId;

#[derive(Debug, Clone)]
pub struct OutboxSink {
    root: PathBuf,
}

impl OutboxSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory receiving files for `sink`.
    pub fn sink_dir(&self, sink: SinkId) -> PathBuf {
        self.root.join(sink.to_string())
    }
}

#[async_trait]
impl DeliverySink for OutboxSink {
    async fn send(&self, sink: SinkId, file: &DeliveryFile) -> Result<(), SinkError> {
        let name = file
            .path
            .file_name()
            .ok_or_else(|| SinkError::Rejected(format!("not a file: {}", file.path.display())))?;
        let dir = self.sink_dir(sink);
        tokio::fs::create_dir_all(&dir).await?;
        let dest = dir.join(name);
        let bytes = tokio::fs::copy(&file.path, &dest).await?;
        if let Some(caption) = &file.caption {
            let mut caption_path = dest.clone().into_os_string();
            caption_path.push(".txt");
            tokio::fs::write(PathBuf::from(caption_path), caption).await?;
        }
        tracing::info!(
            sink,
            segment = file.index,
            total = file.total,
            bytes,
            dest = %dest.display(),
            "file delivered to outbox"
        );
        Ok(())
    }
}
