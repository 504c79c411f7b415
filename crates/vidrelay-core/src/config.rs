use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Longest overlap accepted between neighbouring segments.
const MAX_OVERLAP_SECS: f64 = 3600.0;

/// Task queue parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Wall-clock budget per job, measured from job start.
    pub job_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 600,
        }
    }
}

impl QueueConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Retrieval tool invocation and the quality-fallback ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Program name or path of the retrieval tool.
    pub ytdlp_program: String,
    /// Ordered quality tiers (max video height), highest first.
    pub quality_tiers: Vec<u32>,
    /// Target total bitrate ceiling in kbit/s applied to every tier.
    pub max_bitrate_kbps: u32,
    /// Any tier whose declared or actual size exceeds this is skipped.
    pub absolute_size_ceiling_bytes: u64,
    /// Downloads smaller than this are treated as broken.
    pub min_file_bytes: u64,
    /// Optional Netscape cookies file for age-restricted content.
    pub cookies_file: Option<PathBuf>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ytdlp_program: "yt-dlp".to_string(),
            quality_tiers: vec![360, 240, 144],
            max_bitrate_kbps: 600,
            absolute_size_ceiling_bytes: 2 * GIB,
            min_file_bytes: 1024,
            cookies_file: None,
        }
    }
}

/// What to do with a produced segment that is still over the delivery ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Hand the transcoder's best-effort output to the sink anyway.
    #[default]
    PassThrough,
    /// Fail the job with a split error.
    Reject,
}

/// Transcoder invocation and segment planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub ffmpeg_program: String,
    pub ffprobe_program: String,
    /// Files above this size are split before delivery.
    pub delivery_ceiling_bytes: u64,
    /// Planned size of each segment (must not exceed the delivery ceiling).
    pub segment_target_bytes: u64,
    /// Seconds repeated at the start of the next segment.
    pub overlap_secs: f64,
    pub oversize_policy: OversizePolicy,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_program: "ffmpeg".to_string(),
            ffprobe_program: "ffprobe".to_string(),
            delivery_ceiling_bytes: 50 * MIB,
            segment_target_bytes: 40 * MIB,
            overlap_secs: 5.0,
            oversize_policy: OversizePolicy::PassThrough,
        }
    }
}

impl SplitterConfig {
    pub fn overlap(&self) -> Duration {
        Duration::try_from_secs_f64(self.overlap_secs).unwrap_or_default()
    }
}

/// Retry parameters for a single file hand-off to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Maximum number of attempts per file (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

/// Who may submit requests, and where group requests are delivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub allowed_users: Vec<i64>,
    pub target_channel: Option<i64>,
}

/// Filesystem locations. Unset entries fall back to XDG directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for per-job scratch directories.
    pub work_dir: Option<PathBuf>,
    /// SQLite file backing the dedup store.
    pub dedup_db: Option<PathBuf>,
    /// Root of the local outbox sink used by the CLI.
    pub outbox_dir: Option<PathBuf>,
}

/// Global configuration loaded from `~/.config/vidrelay/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub queue: QueueConfig,
    pub fetcher: FetcherConfig,
    pub splitter: SplitterConfig,
    pub delivery: DeliveryConfig,
    pub access: AccessConfig,
    pub storage: StorageConfig,
}

impl RelayConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue.job_timeout_secs == 0 {
            bail!("queue.job_timeout_secs must be greater than zero");
        }
        let tiers = &self.fetcher.quality_tiers;
        if tiers.is_empty() {
            bail!("fetcher.quality_tiers must list at least one tier");
        }
        if tiers.contains(&0) {
            bail!("fetcher.quality_tiers must not contain 0");
        }
        if tiers.windows(2).any(|w| w[0] <= w[1]) {
            bail!("fetcher.quality_tiers must be strictly descending: {:?}", tiers);
        }
        if self.fetcher.absolute_size_ceiling_bytes == 0 {
            bail!("fetcher.absolute_size_ceiling_bytes must be greater than zero");
        }
        let sp = &self.splitter;
        if sp.segment_target_bytes == 0 || sp.segment_target_bytes > sp.delivery_ceiling_bytes {
            bail!(
                "splitter.segment_target_bytes ({}) must be in 1..={} (delivery ceiling)",
                sp.segment_target_bytes,
                sp.delivery_ceiling_bytes
            );
        }
        if !(0.0..=MAX_OVERLAP_SECS).contains(&sp.overlap_secs) {
            bail!("splitter.overlap_secs must be in 0..={}", MAX_OVERLAP_SECS);
        }
        let dl = &self.delivery;
        if dl.max_attempts == 0 {
            bail!("delivery.max_attempts must be at least 1");
        }
        if !(0.0..=dl.max_delay_secs as f64).contains(&dl.base_delay_secs) {
            bail!(
                "delivery.base_delay_secs must be in 0..={} (max_delay_secs)",
                dl.max_delay_secs
            );
        }
        Ok(())
    }

    /// Scratch root for job directories.
    pub fn work_dir(&self) -> Result<PathBuf> {
        match &self.storage.work_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(xdg_dirs()?.get_cache_home().join(APP_DIR).join("work")),
        }
    }

    /// Path of the dedup database file.
    pub fn dedup_db_path(&self) -> Result<PathBuf> {
        match &self.storage.dedup_db {
            Some(p) => Ok(p.clone()),
            None => Ok(state_dir()?.join("dedup.db")),
        }
    }

    /// Root of the outbox sink.
    pub fn outbox_dir(&self) -> Result<PathBuf> {
        match &self.storage.outbox_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(xdg_dirs()?.get_data_home().join(APP_DIR).join("outbox")),
        }
    }
}

const APP_DIR: &str = "vidrelay";

fn xdg_dirs() -> Result<xdg::BaseDirectories> {
    Ok(xdg::BaseDirectories::with_prefix(APP_DIR)?)
}

/// State directory (`~/.local/state/vidrelay`) holding the log, DB and control socket.
pub fn state_dir() -> Result<PathBuf> {
    Ok(xdg_dirs()?.get_state_home().join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(xdg_dirs()?.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RelayConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RelayConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<RelayConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: RelayConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
