//! Video retrieval through yt-dlp with a quality-fallback ladder.
//!
//! For each tier (highest first) the fetcher probes the selected format with
//! `--dump-json`. A declared size over the absolute ceiling moves on to the
//! next tier without downloading. When the tool cannot declare a size the
//! tier is downloaded and the real file is checked instead; an oversized file
//! is deleted and the ladder continues. Running out of tiers is
//! `FetchError::NoViableQuality`. Tool failures are surfaced, never retried.

mod credentials;
mod ladder;
mod metadata;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandRunner, CommandSpec};
use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::source_id::VideoKey;

pub use credentials::{CookieFile, CredentialSource};
pub use ladder::{ladder, QualityTier};
pub use metadata::{parse_probe, ProbeInfo};

/// File stem of the downloaded artifact inside the job directory.
const OUTPUT_STEM: &str = "video";

/// A downloaded file ready for splitting or delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedVideo {
    pub path: PathBuf,
    /// Real size on disk.
    pub size: u64,
    /// Size the tool declared before download, if any.
    pub declared_size: Option<u64>,
    /// Identity reported by the tool.
    pub video: VideoKey,
    pub title: Option<String>,
    pub duration: Option<Duration>,
    pub tier: QualityTier,
}

/// Retrieval capability used by the orchestrator.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download `url` into `dest_dir` (which the caller owns and cleans up).
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedVideo, FetchError>;
}

pub struct Fetcher {
    runner: Arc<dyn CommandRunner>,
    cfg: FetcherConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl Fetcher {
    /// Fetcher using the cookies file named in `cfg`, if any.
    pub fn new(runner: Arc<dyn CommandRunner>, cfg: FetcherConfig) -> Self {
        let credentials = Arc::new(CookieFile::new(cfg.cookies_file.clone()));
        Self {
            runner,
            cfg,
            credentials,
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    fn base_command(&self, tier: &QualityTier) -> CommandSpec {
        let mut spec = CommandSpec::new(self.cfg.ytdlp_program.clone())
            .args(["--no-playlist", "--no-warnings", "-f"])
            .arg(tier.format_selector());
        if let Some(cookies) = self.credentials.cookies_file() {
            spec = spec.arg("--cookies").arg(cookies);
        }
        spec
    }

    async fn probe(&self, url: &str, tier: &QualityTier) -> Result<ProbeInfo, FetchError> {
        let spec = self
            .base_command(tier)
            .args(["--dump-json", "--skip-download"])
            .arg(url);
        let out = self.runner.run(spec).await?;
        if !out.success() {
            return Err(FetchError::from_tool(&out.stderr_lossy(), out.code));
        }
        parse_probe(&out.stdout_lossy())
    }

    async fn download(
        &self,
        url: &str,
        tier: &QualityTier,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let template = dest_dir.join(format!("{OUTPUT_STEM}.%(ext)s"));
        let spec = self
            .base_command(tier)
            .args(["--merge-output-format", "mp4", "--no-simulate"])
            .args(["--print", "after_move:filepath", "-o"])
            .arg(template)
            .arg(url);
        let out = self.runner.run(spec).await?;
        if !out.success() {
            return Err(FetchError::from_tool(&out.stderr_lossy(), out.code));
        }

        let printed = out
            .stdout_lossy()
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(PathBuf::from);
        if let Some(path) = printed.filter(|p| p.is_file()) {
            return Ok(path);
        }
        find_output(dest_dir).await
    }
}

/// Locate the finished download when the tool did not print its path.
async fn find_output(dest_dir: &Path) -> Result<PathBuf, FetchError> {
    let mut entries = tokio::fs::read_dir(dest_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_output = path.file_stem().and_then(|s| s.to_str()) == Some(OUTPUT_STEM);
        let is_partial = path.extension().and_then(|e| e.to_str()) == Some("part");
        if is_output && !is_partial && entry.file_type().await?.is_file() {
            return Ok(path);
        }
    }
    Err(FetchError::FileMissing(dest_dir.join(OUTPUT_STEM)))
}

#[async_trait]
impl VideoFetcher for Fetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedVideo, FetchError> {
        let ceiling = self.cfg.absolute_size_ceiling_bytes;
        for tier in ladder(&self.cfg) {
            let info = self.probe(url, &tier).await?;
            if let Some(declared) = info.declared_size {
                if declared > ceiling {
                    tracing::info!(
                        tier = tier.max_height,
                        declared,
                        ceiling,
                        "declared size over ceiling, stepping down"
                    );
                    continue;
                }
            }

            tracing::info!(
                tier = tier.max_height,
                video = %info.video_key(),
                declared = ?info.declared_size,
                "downloading"
            );
            let path = self.download(url, &tier, dest_dir).await?;
            let size = tokio::fs::metadata(&path).await?.len();
            if size < self.cfg.min_file_bytes {
                return Err(FetchError::FileMissing(path));
            }
            if size > ceiling {
                tracing::info!(
                    tier = tier.max_height,
                    size,
                    ceiling,
                    "downloaded file over ceiling, stepping down"
                );
                tokio::fs::remove_file(&path).await?;
                continue;
            }

            return Ok(FetchedVideo {
                path,
                size,
                declared_size: info.declared_size,
                video: info.video_key(),
                title: info.title,
                duration: info.duration,
                tier,
            });
        }
        Err(FetchError::NoViableQuality)
    }
}
