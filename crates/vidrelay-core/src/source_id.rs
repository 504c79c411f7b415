//! Canonical video identity derived from a request URL.
//!
//! The identity is the dedup key component: two URLs that point at the same
//! video (different query strings, short vs. long form, tracking parameters)
//! must map to the same `VideoKey`.

use std::fmt;
use url::Url;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];
const YOUTU_BE: &str = "youtu.be";

/// Query parameters that never identify a video (sharing and tracking noise).
const NOISE_PARAMS: &[&str] = &[
    "si", "feature", "t", "list", "index", "fbclid", "gclid", "igshid", "mibextid", "share",
    "ref",
];

fn is_noise_param(name: &str) -> bool {
    name.starts_with("utm_") || NOISE_PARAMS.contains(&name)
}

/// Normalized identity of a source video (e.g. `youtube:dQw4w9WgXcQ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoKey(String);

impl VideoKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// YouTube video id when this key names a YouTube video.
    pub fn youtube_id(&self) -> Option<&str> {
        self.0.strip_prefix("youtube:")
    }
}

impl fmt::Display for VideoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_youtube_id(s: &str) -> bool {
    s.len() == 11
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn youtube_id(url: &Url, host: &str) -> Option<String> {
    let candidate = if host == YOUTU_BE {
        url.path_segments()?.next().map(str::to_string)
    } else {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts") | Some("embed") | Some("live") | Some("v") => {
                segments.next().map(str::to_string)
            }
            _ => None,
        }
    }?;
    is_youtube_id(&candidate).then_some(candidate)
}

fn parse_http(raw: &str) -> Option<(Url, String)> {
    let url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    Some((url, host))
}

/// Derive the canonical identity of the video behind `raw`.
///
/// Returns `None` for non-http(s) input and for YouTube URLs without a valid
/// 11-character video id. Other hosts keep their identifying query pairs,
/// sorted, since many sites carry the video id in the query.
pub fn canonical_video_id(raw: &str) -> Option<VideoKey> {
    let (url, host) = parse_http(raw)?;
    if host == YOUTU_BE || YOUTUBE_HOSTS.contains(&host.as_str()) {
        return youtube_id(&url, &host).map(|id| VideoKey(format!("youtube:{id}")));
    }
    let path = url.path().trim_end_matches('/');
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_noise_param(&k.to_ascii_lowercase()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        return Some(VideoKey(format!("{host}{path}")));
    }
    pairs.sort();
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    Some(VideoKey(format!("{host}{path}?{query}")))
}

/// URL handed to the retrieval tool: short form for YouTube, query-free otherwise.
pub fn clean_url(raw: &str) -> Option<String> {
    let key = canonical_video_id(raw)?;
    if let Some(id) = key.youtube_id() {
        return Some(format!("https://youtu.be/{id}"));
    }
    let (mut url, _) = parse_http(raw)?;
    url.set_fragment(None);
    Some(url.to_string())
}
