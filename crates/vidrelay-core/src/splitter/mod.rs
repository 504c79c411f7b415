//! Cutting an oversized file into bounded segments with ffmpeg.
//!
//! Segments are produced one at a time with stream copy (`-c copy`), so a
//! cut lands on the nearest keyframe and the produced size can drift from the
//! plan. What happens to an overflowing segment is `OversizePolicy`; the
//! splitter never re-splits.

mod plan;
mod probe;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandRunner, CommandSpec};
use crate::config::{OversizePolicy, SplitterConfig};
use crate::error::{truncate_diagnostic, SplitError};
use crate::job::FileSegment;

pub use plan::{max_segment_duration, plan_segments, PlannedSegment};
pub use probe::parse_duration;

/// Splitting capability used by the orchestrator.
#[async_trait]
pub trait VideoSplitter: Send + Sync {
    /// Cut `input` into segments of projected size at most `size_ceiling`,
    /// neighbours sharing `overlap`. Outputs are written to `out_dir`.
    async fn split(
        &self,
        input: &Path,
        out_dir: &Path,
        size_ceiling: u64,
        overlap: Duration,
    ) -> Result<Vec<FileSegment>, SplitError>;
}

pub struct Splitter {
    runner: Arc<dyn CommandRunner>,
    cfg: SplitterConfig,
}

impl Splitter {
    pub fn new(runner: Arc<dyn CommandRunner>, cfg: SplitterConfig) -> Self {
        Self { runner, cfg }
    }

    pub async fn probe_duration(&self, input: &Path) -> Result<Duration, SplitError> {
        let spec = CommandSpec::new(self.cfg.ffprobe_program.clone())
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(input);
        let out = self.runner.run(spec).await?;
        if !out.success() {
            return Err(SplitError::ProbeFailed(truncate_diagnostic(&out.stderr_lossy())));
        }
        parse_duration(&out.stdout_lossy())
    }

    async fn cut(&self, input: &Path, seg: &PlannedSegment, output: &Path) -> Result<(), SplitError> {
        let spec = CommandSpec::new(self.cfg.ffmpeg_program.clone())
            .args(["-y", "-v", "error", "-ss"])
            .arg(secs_arg(seg.start))
            .arg("-i")
            .arg(input)
            .arg("-t")
            .arg(secs_arg(seg.duration()))
            .args(["-c", "copy"])
            .arg(output);
        let out = self.runner.run(spec).await?;
        if !out.success() {
            return Err(SplitError::TranscoderFailed {
                index: seg.index,
                diagnostic: truncate_diagnostic(&out.stderr_lossy()),
                exit_code: out.code,
            });
        }
        Ok(())
    }
}

fn secs_arg(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// `<stem>_partNNN.<ext>` next to the other segments.
fn segment_path(input: &Path, out_dir: &Path, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    out_dir.join(format!("{stem}_part{index:03}.{ext}"))
}

#[async_trait]
impl VideoSplitter for Splitter {
    async fn split(
        &self,
        input: &Path,
        out_dir: &Path,
        size_ceiling: u64,
        overlap: Duration,
    ) -> Result<Vec<FileSegment>, SplitError> {
        let size = tokio::fs::metadata(input).await?.len();
        let total = self.probe_duration(input).await?;
        let plan = plan_segments(total, size, size_ceiling, overlap)?;
        tracing::info!(
            size,
            duration_ms = total.as_millis() as u64,
            segments = plan.len(),
            "splitting"
        );

        tokio::fs::create_dir_all(out_dir).await?;
        let mut segments = Vec::with_capacity(plan.len());
        for seg in &plan {
            let path = segment_path(input, out_dir, seg.index);
            self.cut(input, seg, &path).await?;
            let produced = tokio::fs::metadata(&path).await?.len();

            let hard_ceiling = self.cfg.delivery_ceiling_bytes;
            if produced > hard_ceiling {
                match self.cfg.oversize_policy {
                    OversizePolicy::PassThrough => tracing::warn!(
                        segment = seg.index,
                        produced,
                        ceiling = hard_ceiling,
                        "segment over ceiling, passing through"
                    ),
                    OversizePolicy::Reject => {
                        return Err(SplitError::OversizedSegment {
                            index: seg.index,
                            size: produced,
                            ceiling: hard_ceiling,
                        })
                    }
                }
            }
            tracing::debug!(segment = seg.index, produced, path = %path.display(), "segment written");

            segments.push(FileSegment {
                index: seg.index,
                path,
                size: produced,
                start: seg.start,
                end: seg.end,
            });
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::{arg_after, failed, ok, FakeRunner};

    /// ffprobe reports `duration`; ffmpeg writes `bytes_per_sec * -t` bytes.
    fn tools(duration: &'static str, bytes_per_sec: u64) -> Arc<FakeRunner> {
        Arc::new(FakeRunner::new(move |spec| {
            if spec.program == "ffprobe" {
                return Ok(ok(format!("{{\"format\":{{\"duration\":\"{duration}\"}}}}")));
            }
            let secs: f64 = arg_after(spec, "-t").unwrap().parse().unwrap();
            let out = spec.display_args().last().unwrap().clone();
            std::fs::write(out, vec![0u8; (secs * bytes_per_sec as f64) as usize]).unwrap();
            Ok(ok(""))
        }))
    }

    fn cfg(policy: OversizePolicy) -> SplitterConfig {
        SplitterConfig {
            delivery_ceiling_bytes: 50 * 1024,
            segment_target_bytes: 40 * 1024,
            oversize_policy: policy,
            ..SplitterConfig::default()
        }
    }

    fn source(dir: &Path, bytes: u64) -> PathBuf {
        let p = dir.join("video.mp4");
        std::fs::write(&p, vec![0u8; bytes as usize]).unwrap();
        p
    }

    #[tokio::test]
    async fn segments_are_cut_sequentially_with_overlap() {
        let dir = tempfile::tempdir().unwrap();
        // 100 s at 1 KiB/s; 40 KiB target gives 40 s segments.
        let input = source(dir.path(), 100 * 1024);
        let runner = tools("100.0", 1024);
        let splitter = Splitter::new(runner.clone(), cfg(OversizePolicy::Reject));

        let out_dir = dir.path().join("parts");
        let segs = splitter
            .split(&input, &out_dir, 40 * 1024, Duration::from_secs(5))
            .await
            .unwrap();

        let starts: Vec<u64> = segs.iter().map(|s| s.start.as_secs()).collect();
        assert_eq!(starts, vec![0, 35, 70]);
        assert_eq!(segs.last().unwrap().end, Duration::from_secs(100));
        for (i, s) in segs.iter().enumerate() {
            assert_eq!(s.index, i);
            assert!(s.path.exists());
            assert!(s.size <= 40 * 1024);
        }
        assert_eq!(segs[0].path, out_dir.join("video_part000.mp4"));

        let calls = runner.calls();
        assert_eq!(calls[0].program, "ffprobe");
        let ffmpeg: Vec<_> = calls.iter().filter(|c| c.program == "ffmpeg").collect();
        assert_eq!(ffmpeg.len(), 3);
        assert_eq!(arg_after(ffmpeg[1], "-ss").as_deref(), Some("35.000"));
        assert_eq!(arg_after(ffmpeg[1], "-t").as_deref(), Some("40.000"));
        assert_eq!(arg_after(ffmpeg[2], "-t").as_deref(), Some("30.000"));
    }

    #[tokio::test]
    async fn oversized_output_passes_through_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let input = source(dir.path(), 100 * 1024);
        // Transcoder output is twice the projected size.
        let splitter = Splitter::new(tools("100.0", 2048), cfg(OversizePolicy::PassThrough));
        let segs = splitter
            .split(&input, dir.path(), 40 * 1024, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(segs.len(), 3);
        assert!(segs[0].size > 50 * 1024);
    }

    #[tokio::test]
    async fn oversized_output_rejected_by_policy() {
        let dir = tempfile::tempdir().unwrap();
        let input = source(dir.path(), 100 * 1024);
        let splitter = Splitter::new(tools("100.0", 2048), cfg(OversizePolicy::Reject));
        let err = splitter
            .split(&input, dir.path(), 40 * 1024, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::OversizedSegment { index: 0, .. }));
    }

    #[tokio::test]
    async fn transcoder_failure_stops_the_split() {
        let dir = tempfile::tempdir().unwrap();
        let input = source(dir.path(), 100 * 1024);
        let runner = Arc::new(FakeRunner::new(|spec| {
            if spec.program == "ffprobe" {
                Ok(ok(r#"{"format":{"duration":"100.0"}}"#))
            } else {
                Ok(failed(1, "Invalid data found when processing input"))
            }
        }));
        let splitter = Splitter::new(runner.clone(), SplitterConfig::default());
        let err = splitter
            .split(&input, dir.path(), 40 * 1024, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            SplitError::TranscoderFailed {
                index, diagnostic, ..
            } => {
                assert_eq!(index, 0);
                assert_eq!(diagnostic, "Invalid data found when processing input");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn probe_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = source(dir.path(), 1024);
        let runner = Arc::new(FakeRunner::new(|_| Ok(failed(1, "moov atom not found"))));
        let splitter = Splitter::new(runner, SplitterConfig::default());
        assert!(matches!(
            splitter.split(&input, dir.path(), 512, Duration::ZERO).await,
            Err(SplitError::ProbeFailed(_))
        ));
    }
}
