//! Inspection of the Netscape cookies file used for age-restricted videos.
//!
//! Admin tooling only: the fetcher just passes the file through.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Auth cookies whose expiry decides whether age-gated fetches keep working.
pub const IMPORTANT_COOKIES: &[&str] = &[
    "LOGIN_INFO",
    "SAPISID",
    "HSID",
    "SSID",
    "__Secure-3PAPISID",
    "__Secure-3PSID",
    "__Secure-3PSIDCC",
];

/// The important cookie that expires first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieExpiry {
    pub name: String,
    /// Unix seconds.
    pub expires_at: i64,
    /// Time left; `None` once expired.
    pub remaining: Option<Duration>,
}

impl CookieExpiry {
    pub fn is_expired(&self) -> bool {
        self.remaining.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieReport {
    pub present: bool,
    pub entries: usize,
    pub soonest_important: Option<CookieExpiry>,
}

/// Parse the cookies file at `path` and report on it as of `now`.
///
/// A missing file is reported as `present: false`, not as an error.
pub fn inspect_cookies(path: &Path, now: SystemTime) -> Result<CookieReport> {
    if !path.exists() {
        return Ok(CookieReport {
            present: false,
            entries: 0,
            soonest_important: None,
        });
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading cookies file {}", path.display()))?;
    Ok(report_from_str(&data, now))
}

fn report_from_str(data: &str, now: SystemTime) -> CookieReport {
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let mut entries = 0;
    let mut soonest: Option<(i64, &str)> = None;
    for line in data.lines() {
        let line = line.trim_end_matches('\r');
        // `#HttpOnly_` lines are real cookies; other `#` lines are comments.
        let line = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if line.trim().is_empty() || line.starts_with('#') => continue,
            None => line,
        };
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            continue;
        }
        entries += 1;
        let name = fields[5];
        if !IMPORTANT_COOKIES.contains(&name) {
            continue;
        }
        let Ok(expires) = fields[4].trim().parse::<i64>() else {
            continue;
        };
        // Session cookies carry expiry 0.
        if expires == 0 {
            continue;
        }
        if soonest.map_or(true, |(e, _)| expires < e) {
            soonest = Some((expires, name));
        }
    }

    let soonest_important = soonest.map(|(expires_at, name)| CookieExpiry {
        name: name.to_string(),
        expires_at,
        remaining: (expires_at > now_secs)
            .then(|| Duration::from_secs((expires_at - now_secs) as u64)),
    });

    CookieReport {
        present: true,
        entries,
        soonest_important,
    }
}
