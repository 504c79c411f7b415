//! Per-job pipeline: dedup check, fetch, split, deliver, record, clean up.
//!
//! Every step's failure ends the job; nothing is retried inside a run. All
//! job-owned files live in one scratch directory that is removed when the run
//! ends, whichever way it ends (including the queue dropping the run on
//! timeout).

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::Instrument;

use crate::command::{CommandRunner, TokioCommandRunner};
use crate::config::RelayConfig;
use crate::dedup_db::{DedupDb, Outcome};
use crate::error::{FetchError, PipelineError, SplitError};
use crate::fetcher::{Fetcher, VideoFetcher};
use crate::job::{FileSegment, Job, JobResult};
use crate::queue::JobExecutor;
use crate::sink::{DeliveryFile, DeliverySink};
use crate::source_id::{canonical_video_id, clean_url, VideoKey};
use crate::splitter::{Splitter, VideoSplitter};

/// Sizes and locations the pipeline works with.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Root under which each job gets its own scratch directory.
    pub work_dir: PathBuf,
    /// Fetched files above this size are split.
    pub delivery_ceiling_bytes: u64,
    /// Planned size of each segment.
    pub segment_target_bytes: u64,
    pub overlap: Duration,
}

impl PipelineOptions {
    pub fn from_config(cfg: &RelayConfig) -> Result<Self> {
        Ok(Self {
            work_dir: cfg.work_dir()?,
            delivery_ceiling_bytes: cfg.splitter.delivery_ceiling_bytes,
            segment_target_bytes: cfg.splitter.segment_target_bytes,
            overlap: cfg.splitter.overlap(),
        })
    }
}

pub struct Orchestrator {
    dedup: DedupDb,
    fetcher: Arc<dyn VideoFetcher>,
    splitter: Arc<dyn VideoSplitter>,
    sink: Arc<dyn DeliverySink>,
    opts: PipelineOptions,
}

enum Flow {
    Skipped(VideoKey),
    Delivered(VideoKey, Vec<FileSegment>),
}

struct Failure {
    error: PipelineError,
    files: Vec<FileSegment>,
}

impl From<PipelineError> for Failure {
    fn from(error: PipelineError) -> Self {
        Failure {
            error,
            files: Vec::new(),
        }
    }
}

impl From<FetchError> for Failure {
    fn from(e: FetchError) -> Self {
        PipelineError::from(e).into()
    }
}

impl From<SplitError> for Failure {
    fn from(e: SplitError) -> Self {
        PipelineError::from(e).into()
    }
}

impl Orchestrator {
    pub fn new(
        dedup: DedupDb,
        fetcher: Arc<dyn VideoFetcher>,
        splitter: Arc<dyn VideoSplitter>,
        sink: Arc<dyn DeliverySink>,
        opts: PipelineOptions,
    ) -> Self {
        Self {
            dedup,
            fetcher,
            splitter,
            sink,
            opts,
        }
    }

    /// Production wiring: yt-dlp and ffmpeg through the tokio command runner.
    pub fn from_config(cfg: &RelayConfig, dedup: DedupDb, sink: Arc<dyn DeliverySink>) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new());
        let fetcher = Arc::new(Fetcher::new(runner.clone(), cfg.fetcher.clone()));
        let splitter = Arc::new(Splitter::new(runner, cfg.splitter.clone()));
        Ok(Self::new(
            dedup,
            fetcher,
            splitter,
            sink,
            PipelineOptions::from_config(cfg)?,
        ))
    }

    pub fn dedup(&self) -> &DedupDb {
        &self.dedup
    }

    /// Run one job to a terminal result and record the outcome.
    pub async fn run(&self, job: &Job) -> JobResult {
        let span = tracing::info_span!("job", job_id = job.id, sink = job.sink);
        async {
            let started = Instant::now();
            let video = canonical_video_id(&job.url);
            let flow = self.process(job, video.as_ref()).await;
            let duration = started.elapsed();

            let result = match flow {
                Ok(Flow::Skipped(video)) => {
                    tracing::info!(video = %video, "already delivered, skipping");
                    JobResult::skipped(job, video, duration)
                }
                Ok(Flow::Delivered(video, files)) => {
                    JobResult::succeeded(job, video, files, duration)
                }
                Err(f) => {
                    tracing::warn!(error = %f.error, "job failed");
                    JobResult::from_error(job, video, f.files, &f.error, duration)
                }
            };
            self.record(job, &result).await;
            result
        }
        .instrument(span)
        .await
    }

    async fn process(&self, job: &Job, video: Option<&VideoKey>) -> Result<Flow, Failure> {
        let video = video
            .cloned()
            .ok_or_else(|| PipelineError::InvalidSource(job.url.clone()))?;

        if !job.force_redownload {
            let prior = self
                .dedup
                .lookup(job.sink, &video)
                .await
                .map_err(PipelineError::Store)?;
            if prior.is_some_and(|r| r.blocks_reprocessing()) {
                return Ok(Flow::Skipped(video));
            }
        }

        // Dropped at the end of this function (or when the queue drops the
        // future on timeout), deleting every job-owned file.
        let workspace = self.workspace(job).await?;
        let url = clean_url(&job.url).unwrap_or_else(|| job.url.clone());
        let fetched = self.fetcher.fetch(&url, workspace.path()).await?;
        tracing::info!(
            video = %video,
            size = fetched.size,
            tier = fetched.tier.max_height,
            "fetched"
        );
        if fetched.video != video {
            tracing::debug!(
                reported = %fetched.video,
                video = %video,
                "downloader reports a different video id"
            );
        }

        let files = if fetched.size > self.opts.delivery_ceiling_bytes {
            let parts = self
                .splitter
                .split(
                    &fetched.path,
                    &workspace.path().join("parts"),
                    self.opts.segment_target_bytes,
                    self.opts.overlap,
                )
                .await?;
            // The source is no longer needed; free the space before delivery.
            if let Err(e) = tokio::fs::remove_file(&fetched.path).await {
                tracing::debug!("could not remove fetched source early: {}", e);
            }
            parts
        } else {
            vec![FileSegment {
                index: 0,
                path: fetched.path.clone(),
                size: fetched.size,
                start: Duration::ZERO,
                end: fetched.duration.unwrap_or_default(),
            }]
        };

        let total = files.len();
        let deliveries: Vec<DeliveryFile> = files
            .iter()
            .enumerate()
            .map(|(i, f)| DeliveryFile::new(f.path.clone(), i, total, fetched.title.as_deref()))
            .collect();
        for (i, delivery) in deliveries.iter().enumerate() {
            if let Err(source) = self.sink.send(job.sink, delivery).await {
                return Err(Failure {
                    error: PipelineError::Sink {
                        delivered: i,
                        total,
                        source,
                    },
                    files,
                });
            }
            tracing::debug!(segment = i, total, "handed to sink");
        }

        drop(workspace);
        Ok(Flow::Delivered(video, files))
    }

    async fn workspace(&self, job: &Job) -> Result<TempDir, FetchError> {
        tokio::fs::create_dir_all(&self.opts.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job.id))
            .tempdir_in(&self.opts.work_dir)?;
        Ok(dir)
    }

    /// Persist the outcome; skipped and invalid jobs leave the store untouched.
    async fn record(&self, job: &Job, result: &JobResult) {
        let (Some(outcome), Some(video)) = (Outcome::for_state(result.state), &result.video) else {
            return;
        };
        let message = result.failure.as_ref().map(|f| f.message.as_str());
        if let Err(e) = self.dedup.record(job.sink, video, outcome, message).await {
            tracing::error!(video = %video, "failed to record outcome: {:#}", e);
        }
    }
}

#[async_trait]
impl JobExecutor for Orchestrator {
    async fn execute(&self, job: &Job) -> JobResult {
        self.run(job).await
    }

    async fn on_timeout(&self, job: &Job, elapsed: Duration) -> JobResult {
        let result = JobResult::from_error(
            job,
            canonical_video_id(&job.url),
            Vec::new(),
            &PipelineError::Timeout(elapsed),
            elapsed,
        );
        self.record(job, &result).await;
        result
    }
}

#[cfg(test)]
mod tests;
