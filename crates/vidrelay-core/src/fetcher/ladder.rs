//! Quality-fallback ladder.

use crate::config::FetcherConfig;

/// One rung of the ladder: a maximum video height under a bitrate ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityTier {
    pub max_height: u32,
    pub max_bitrate_kbps: u32,
}

impl QualityTier {
    /// yt-dlp format selector: progressive mp4 under the bitrate ceiling first,
    /// then merged streams, then anything at this height.
    pub fn format_selector(&self) -> String {
        let h = self.max_height;
        format!(
            "best[height<={h}][ext=mp4][tbr<={k}]/bestvideo[height<={h}]+bestaudio/best[height<={h}]",
            k = self.max_bitrate_kbps
        )
    }
}

/// Ordered tiers, highest quality first.
pub fn ladder(cfg: &FetcherConfig) -> Vec<QualityTier> {
    cfg.quality_tiers
        .iter()
        .map(|&max_height| QualityTier {
            max_height,
            max_bitrate_kbps: cfg.max_bitrate_kbps,
        })
        .collect()
}
