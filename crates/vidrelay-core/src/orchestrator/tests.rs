use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::*;
use crate::dedup_db::db::open_memory;
use crate::error::{SinkError, SplitError};
use crate::fetcher::{FetchedVideo, QualityTier};
use crate::job::{FailureKind, JobRequest, SinkId, TerminalState};
use crate::queue::{QueueOptions, TaskQueue};

const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10";

/// Writes `size` bytes into the job directory; optionally fails or hangs.
struct FakeFetcher {
    size: u64,
    fail: bool,
    hang: bool,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn sized(size: u64) -> Arc<Self> {
        Arc::new(Self::base(size))
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::base(1)
        })
    }

    fn hanging(size: u64) -> Arc<Self> {
        Arc::new(Self {
            hang: true,
            ..Self::base(size)
        })
    }

    fn base(size: u64) -> Self {
        Self {
            size,
            fail: false,
            hang: false,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedVideo, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(FetchError::ToolFailed {
                diagnostic: "ERROR: Video unavailable".into(),
                exit_code: Some(1),
            });
        }
        let path = dest_dir.join("video.mp4");
        tokio::fs::write(&path, vec![0u8; self.size as usize]).await?;
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(FetchedVideo {
            path,
            size: self.size,
            declared_size: Some(self.size),
            video: VideoKey::new("youtube:dQw4w9WgXcQ"),
            title: Some("Clip".into()),
            duration: Some(Duration::from_secs(90)),
            tier: QualityTier {
                max_height: 360,
                max_bitrate_kbps: 600,
            },
        })
    }
}

/// Cuts the input into `parts` equal files, without overlap arithmetic.
/// With `fail_after`, the transcoder dies once that many parts are written.
struct FakeSplitter {
    parts: usize,
    fail_after: Option<usize>,
    calls: AtomicUsize,
}

impl FakeSplitter {
    fn new(parts: usize, fail_after: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            parts,
            fail_after,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VideoSplitter for FakeSplitter {
    async fn split(
        &self,
        input: &Path,
        out_dir: &Path,
        _size_ceiling: u64,
        overlap: Duration,
    ) -> Result<Vec<FileSegment>, SplitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let size = tokio::fs::metadata(input).await?.len();
        tokio::fs::create_dir_all(out_dir).await?;
        let each = size / self.parts as u64;
        let mut out = Vec::new();
        for index in 0..self.parts {
            if self.fail_after == Some(index) {
                return Err(SplitError::TranscoderFailed {
                    index,
                    diagnostic: "Conversion failed!".into(),
                    exit_code: Some(1),
                });
            }
            let path = out_dir.join(format!("part{index}.mp4"));
            tokio::fs::write(&path, vec![0u8; each as usize]).await?;
            let start = Duration::from_secs(30 * index as u64);
            out.push(FileSegment {
                index,
                path,
                size: each,
                start,
                end: start + Duration::from_secs(30) + overlap,
            });
        }
        Ok(out)
    }
}

/// Records what it receives; fails from `fail_at` on if set.
struct RecordingSink {
    fail_at: Option<usize>,
    received: Mutex<Vec<(SinkId, String, Option<String>)>>,
}

impl RecordingSink {
    fn new(fail_at: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            fail_at,
            received: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(&self, sink: SinkId, file: &DeliveryFile) -> Result<(), SinkError> {
        if self.fail_at.is_some_and(|n| file.index >= n) {
            return Err(SinkError::Rejected("file too large".into()));
        }
        assert!(file.path.exists(), "file must exist while being handed off");
        let name = file.path.file_name().unwrap().to_string_lossy().into_owned();
        self.received
            .lock()
            .unwrap()
            .push((sink, name, file.caption.clone()));
        Ok(())
    }
}

struct Harness {
    orch: Arc<Orchestrator>,
    fetcher: Arc<FakeFetcher>,
    splitter: Arc<FakeSplitter>,
    sink: Arc<RecordingSink>,
    work: tempfile::TempDir,
}

async fn harness(fetcher: Arc<FakeFetcher>, sink: Arc<RecordingSink>) -> Harness {
    harness_with(fetcher, FakeSplitter::new(3, None), sink).await
}

async fn harness_with(
    fetcher: Arc<FakeFetcher>,
    splitter: Arc<FakeSplitter>,
    sink: Arc<RecordingSink>,
) -> Harness {
    let work = tempfile::tempdir().unwrap();
    let orch = Orchestrator::new(
        open_memory().await.unwrap(),
        fetcher.clone(),
        splitter.clone(),
        sink.clone(),
        PipelineOptions {
            work_dir: work.path().join("jobs"),
            delivery_ceiling_bytes: 50_000,
            segment_target_bytes: 40_000,
            overlap: Duration::from_secs(5),
        },
    );
    Harness {
        orch: Arc::new(orch),
        fetcher,
        splitter,
        sink,
        work,
    }
}

impl Harness {
    fn leftover_files(&self) -> usize {
        match std::fs::read_dir(self.work.path().join("jobs")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    async fn record(&self, sink: SinkId) -> Option<crate::dedup_db::VideoRecord> {
        self.orch
            .dedup()
            .lookup(sink, &VideoKey::new("youtube:dQw4w9WgXcQ"))
            .await
            .unwrap()
    }
}

fn job(id: u64, sink: SinkId) -> Job {
    Job::from_request(id, JobRequest::new(1, sink, URL))
}

#[tokio::test]
async fn small_file_is_delivered_whole_and_recorded() {
    let h = harness(FakeFetcher::sized(10_000), RecordingSink::new(None)).await;

    let r = h.orch.run(&job(1, 7)).await;
    assert_eq!(r.state, TerminalState::Succeeded);
    assert_eq!(r.files.len(), 1);
    assert_eq!(r.files[0].size, 10_000);
    assert_eq!(r.video.as_ref().unwrap().as_str(), "youtube:dQw4w9WgXcQ");
    assert_eq!(h.splitter.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *h.sink.received.lock().unwrap(),
        vec![(7, "video.mp4".to_string(), Some("Clip".to_string()))]
    );
    // Query-string noise is stripped before the tool sees the URL.
    assert_eq!(
        *h.fetcher.urls.lock().unwrap(),
        vec!["https://youtu.be/dQw4w9WgXcQ".to_string()]
    );

    let rec = h.record(7).await.unwrap();
    assert_eq!(rec.last_outcome, Outcome::Succeeded);
    assert_eq!(rec.attempt_count, 1);
    assert_eq!(h.leftover_files(), 0);
}

#[tokio::test]
async fn repeated_request_is_skipped_without_fetching() {
    let h = harness(FakeFetcher::sized(10_000), RecordingSink::new(None)).await;

    assert_eq!(h.orch.run(&job(1, 7)).await.state, TerminalState::Succeeded);
    let second = Job::from_request(2, JobRequest::new(1, 7, "https://youtu.be/dQw4w9WgXcQ"));
    let r = h.orch.run(&second).await;
    assert_eq!(r.state, TerminalState::SkippedDuplicate);
    assert!(r.files.is_empty());
    assert_eq!(h.fetcher.calls(), 1);
    // Skips leave the record alone.
    assert_eq!(h.record(7).await.unwrap().attempt_count, 1);

    // Another sink is a different key.
    assert_eq!(h.orch.run(&job(3, 8)).await.state, TerminalState::Succeeded);
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test]
async fn forced_request_reprocesses_and_counts_the_attempt() {
    let h = harness(FakeFetcher::sized(10_000), RecordingSink::new(None)).await;

    h.orch.run(&job(1, 7)).await;
    let forced = Job::from_request(2, JobRequest::new(1, 7, URL).forced());
    let r = h.orch.run(&forced).await;
    assert_eq!(r.state, TerminalState::Succeeded);
    assert_eq!(h.fetcher.calls(), 2);
    assert_eq!(h.record(7).await.unwrap().attempt_count, 2);
    assert_eq!(h.sink.received.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn large_file_is_split_and_delivered_in_order() {
    let h = harness(FakeFetcher::sized(120_000), RecordingSink::new(None)).await;

    let r = h.orch.run(&job(1, 7)).await;
    assert_eq!(r.state, TerminalState::Succeeded);
    assert_eq!(h.splitter.calls.load(Ordering::SeqCst), 1);
    let received = h.sink.received.lock().unwrap().clone();
    let names: Vec<&str> = received.iter().map(|(_, n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["part0.mp4", "part1.mp4", "part2.mp4"]);
    assert_eq!(received[2].2.as_deref(), Some("Clip (3/3)"));
    assert_eq!(r.files.len(), 3);
    assert!(r.files.iter().all(|f| !f.path.exists()));
    assert_eq!(h.leftover_files(), 0);
}

#[tokio::test]
async fn partial_delivery_fails_with_count_and_cleans_up() {
    let h = harness(FakeFetcher::sized(120_000), RecordingSink::new(Some(2))).await;

    let r = h.orch.run(&job(1, 7)).await;
    assert_eq!(r.state, TerminalState::Failed);
    let failure = r.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Sink);
    assert!(failure.message.contains("2/3"), "{}", failure.message);
    // Already delivered parts are not retracted.
    assert_eq!(h.sink.received.lock().unwrap().len(), 2);
    assert_eq!(r.files.len(), 3);

    let rec = h.record(7).await.unwrap();
    assert_eq!(rec.last_outcome, Outcome::Failed);
    assert!(rec.last_message.unwrap().contains("2/3"));
    assert_eq!(h.leftover_files(), 0);

    // A failed record does not block a plain resubmission.
    let again = h.orch.run(&job(2, 7)).await;
    assert_eq!(again.state, TerminalState::Failed);
    assert_eq!(h.fetcher.calls(), 2);
    assert_eq!(h.record(7).await.unwrap().attempt_count, 2);
}

#[tokio::test]
async fn split_failure_after_one_part_records_and_cleans_up() {
    let h = harness_with(
        FakeFetcher::sized(120_000),
        FakeSplitter::new(3, Some(1)),
        RecordingSink::new(None),
    )
    .await;

    let r = h.orch.run(&job(1, 7)).await;
    assert_eq!(r.state, TerminalState::Failed);
    let failure = r.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Split);
    assert!(failure.message.contains("Conversion failed!"), "{}", failure.message);
    assert_eq!(h.splitter.calls.load(Ordering::SeqCst), 1);
    // Nothing is handed off when splitting did not finish.
    assert!(h.sink.received.lock().unwrap().is_empty());

    let rec = h.record(7).await.unwrap();
    assert_eq!(rec.last_outcome, Outcome::Failed);
    assert_eq!(h.leftover_files(), 0);
}

#[tokio::test]
async fn fetch_failure_surfaces_diagnostic() {
    let h = harness(FakeFetcher::failing(), RecordingSink::new(None)).await;

    let r = h.orch.run(&job(1, 7)).await;
    assert_eq!(r.state, TerminalState::Failed);
    let failure = r.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Fetch);
    assert!(failure.message.contains("Video unavailable"));
    assert!(h.sink.received.lock().unwrap().is_empty());
    assert_eq!(h.record(7).await.unwrap().last_outcome, Outcome::Failed);
    assert_eq!(h.leftover_files(), 0);
}

#[tokio::test]
async fn invalid_source_fails_without_touching_tools_or_store() {
    let h = harness(FakeFetcher::sized(10), RecordingSink::new(None)).await;

    let bad = Job::from_request(1, JobRequest::new(1, 7, "https://www.youtube.com/channel/UC1"));
    let r = h.orch.run(&bad).await;
    assert_eq!(r.state, TerminalState::Failed);
    assert_eq!(r.failure.unwrap().kind, FailureKind::InvalidSource);
    assert!(r.video.is_none());
    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.orch.dedup().list_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn timeout_through_the_queue_records_and_cleans_up() {
    let h = harness(FakeFetcher::hanging(10_000), RecordingSink::new(None)).await;
    let (queue, mut results) = TaskQueue::start(
        h.orch.clone(),
        QueueOptions {
            job_timeout: Duration::from_millis(300),
        },
    );

    queue.submit(JobRequest::new(1, 7, URL)).unwrap();
    let r = results.recv().await.unwrap();
    assert_eq!(r.state, TerminalState::TimedOut);
    assert_eq!(r.failure.unwrap().kind, FailureKind::Timeout);
    assert_eq!(h.fetcher.calls(), 1);

    let rec = h.record(7).await.unwrap();
    assert_eq!(rec.last_outcome, Outcome::TimedOut);
    assert_eq!(rec.attempt_count, 1);
    assert_eq!(h.leftover_files(), 0);

    queue.shutdown();
    queue.join().await;
}
