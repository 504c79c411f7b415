//! Parsing of `yt-dlp --dump-json` output.

use serde::Deserialize;
use std::time::Duration;

use crate::error::FetchError;
use crate::source_id::VideoKey;

#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    extractor_key: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    requested_formats: Option<Vec<RawFormat>>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

fn bytes(v: Option<f64>) -> Option<u64> {
    v.filter(|b| b.is_finite() && *b > 0.0).map(|b| b.round() as u64)
}

/// What the probe learned about the selected format.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub id: String,
    pub extractor: String,
    pub title: Option<String>,
    pub duration: Option<Duration>,
    /// Declared size in bytes; `None` when the tool could not tell.
    pub declared_size: Option<u64>,
}

impl ProbeInfo {
    /// Identity as reported by the tool (`youtube:<id>` for YouTube).
    pub fn video_key(&self) -> VideoKey {
        VideoKey::new(format!("{}:{}", self.extractor.to_ascii_lowercase(), self.id))
    }
}

/// Parse the JSON object printed by `--dump-json`.
///
/// The tool prints one object per line; the last object line wins.
pub fn parse_probe(stdout: &str) -> Result<ProbeInfo, FetchError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| FetchError::MalformedOutput("no JSON object in probe output".into()))?;
    let raw: RawInfo = serde_json::from_str(line)
        .map_err(|e| FetchError::MalformedOutput(format!("probe JSON: {e}")))?;

    let id = raw
        .id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FetchError::MalformedOutput("probe JSON has no id".into()))?;

    let merged = raw.requested_formats.as_ref().and_then(|formats| {
        formats
            .iter()
            .map(|f| bytes(f.filesize).or(bytes(f.filesize_approx)))
            .sum::<Option<u64>>()
            .filter(|&total| total > 0)
    });
    let declared_size = bytes(raw.filesize)
        .or(bytes(raw.filesize_approx))
        .or(merged);

    let duration = raw
        .duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| {
            Duration::try_from_secs_f64(d)
                .map_err(|_| FetchError::MalformedOutput(format!("duration {d} out of range")))
        })
        .transpose()?;

    Ok(ProbeInfo {
        id,
        extractor: raw.extractor_key.unwrap_or_else(|| "generic".to_string()),
        title: raw.title,
        duration,
        declared_size,
    })
}
