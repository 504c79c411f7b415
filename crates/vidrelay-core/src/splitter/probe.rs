//! Source duration via ffprobe.

use serde::Deserialize;
use std::time::Duration;

use crate::error::SplitError;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -show_entries format=duration -of json` output.
pub fn parse_duration(stdout: &str) -> Result<Duration, SplitError> {
    let out: ProbeOutput = serde_json::from_str(stdout)
        .map_err(|e| SplitError::ProbeFailed(format!("invalid ffprobe JSON: {e}")))?;
    let raw = out
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| SplitError::ProbeFailed("no duration reported".into()))?;
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SplitError::ProbeFailed(format!("unparseable duration {raw:?}")))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(SplitError::ProbeFailed(format!("non-positive duration {secs}")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| SplitError::ProbeFailed(format!("duration {secs} out of range")))
}
