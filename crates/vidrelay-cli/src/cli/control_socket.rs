//! Control socket: server (during `vidrelay serve`) and client (`submit`, `status`, `cancel`).
//!
//! Protocol: one request per line, `submit <requester> <chat> <url> [force]`,
//! `cancel <id>` or `status`. The server answers with zero or more body lines
//! followed by one line starting with `ok` or `err`.

use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use vidrelay_core::access::AccessPolicy;
use vidrelay_core::config;
use vidrelay_core::job::{JobId, JobRequest, RequesterId, SinkId};
use vidrelay_core::queue::{QueueEntry, TaskQueue};
use vidrelay_core::source_id::canonical_video_id;

/// `~/.local/state/vidrelay/control.sock`
pub fn default_socket_path() -> Result<PathBuf> {
    Ok(config::state_dir()?.join("control.sock"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Submit {
        requester: RequesterId,
        chat: SinkId,
        url: String,
        force: bool,
    },
    Cancel(JobId),
    Status,
}

impl ControlRequest {
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let req = match parts.next() {
            Some("submit") => {
                let requester = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| anyhow!("submit: missing or invalid requester"))?;
                let chat = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| anyhow!("submit: missing or invalid chat"))?;
                let url = parts
                    .next()
                    .ok_or_else(|| anyhow!("submit: missing url"))?
                    .to_string();
                let force = match parts.next() {
                    None => false,
                    Some("force") => true,
                    Some(other) => bail!("submit: unexpected argument '{}'", other),
                };
                ControlRequest::Submit {
                    requester,
                    chat,
                    url,
                    force,
                }
            }
            Some("cancel") => {
                let id = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| anyhow!("cancel: missing or invalid job id"))?;
                ControlRequest::Cancel(id)
            }
            Some("status") => ControlRequest::Status,
            Some(other) => bail!("unknown command '{}'", other),
            None => bail!("empty command"),
        };
        if let Some(extra) = parts.next() {
            bail!("unexpected argument '{}'", extra);
        }
        Ok(req)
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRequest::Submit {
                requester,
                chat,
                url,
                force,
            } => {
                write!(f, "submit {} {} {}", requester, chat, url)?;
                if *force {
                    f.write_str(" force")?;
                }
                Ok(())
            }
            ControlRequest::Cancel(id) => write!(f, "cancel {}", id),
            ControlRequest::Status => f.write_str("status"),
        }
    }
}

/// What the server side needs to answer requests.
pub struct ControlState {
    queue: TaskQueue,
    access: AccessPolicy,
}

impl ControlState {
    pub fn new(queue: TaskQueue, access: AccessPolicy) -> Self {
        Self { queue, access }
    }

    /// Answer one request; the last line is the `ok`/`err` status line.
    pub fn handle(&self, req: ControlRequest) -> Vec<String> {
        match req {
            ControlRequest::Submit {
                requester,
                chat,
                url,
                force,
            } => vec![self.submit(requester, chat, url, force)],
            ControlRequest::Cancel(id) => {
                if self.queue.cancel(id) {
                    vec![format!("ok cancelled {}", id)]
                } else {
                    vec![format!("err job {} is not queued", id)]
                }
            }
            ControlRequest::Status => {
                let entries = self.queue.snapshot();
                let mut lines: Vec<String> = entries.iter().map(entry_line).collect();
                lines.push(format!("ok {}", entries.len()));
                lines
            }
        }
    }

    fn submit(&self, requester: RequesterId, chat: SinkId, url: String, force: bool) -> String {
        if !self.access.is_allowed(requester, chat) {
            tracing::warn!(requester, chat, "submission denied");
            return format!("err requester {} may not send to {}", requester, chat);
        }
        let Some(video) = canonical_video_id(&url) else {
            return format!("err unsupported url {}", url);
        };
        if let Some(id) = self.queue.active_job_for(chat, &video) {
            return format!("err {} is already queued as job {}", video, id);
        }
        let mut req = JobRequest::new(requester, chat, url);
        if force {
            req = req.forced();
        }
        match self.queue.submit(req) {
            Ok(id) => format!("ok {}", id),
            Err(e) => format!("err {}", e),
        }
    }
}

/// Tab-separated: `job`, id, state, elapsed seconds, sink, url.
fn entry_line(e: &QueueEntry) -> String {
    format!(
        "job\t{}\t{}\t{}\t{}\t{}",
        e.id,
        e.state.as_str(),
        e.elapsed.as_secs(),
        e.sink,
        e.url
    )
}

/// Binds `path` (replacing a stale socket) and spawns a task answering each
/// request line through `state`. Malformed lines get an `err` reply.
pub fn spawn_control_listener(
    state: Arc<ControlState>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("binding control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&state, stream).await {
                            tracing::debug!("control connection: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(state: &ControlState, stream: UnixStream) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match ControlRequest::parse(line) {
            Ok(req) => state.handle(req),
            Err(e) => vec![format!("err {}", e)],
        };
        for l in reply {
            write.write_all(l.as_bytes()).await?;
            write.write_all(b"\n").await?;
        }
    }
    Ok(())
}

/// Reply body lines and the text after `ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub body: Vec<String>,
    pub status: String,
}

/// Sends one request and waits for the reply; an `err` status becomes an error.
pub async fn send_request(socket_path: &Path, req: &ControlRequest) -> Result<Reply> {
    if !socket_path.exists() {
        bail!(
            "no control socket at {}; is `vidrelay serve` running?",
            socket_path.display()
        );
    }
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connecting to {}", socket_path.display()))?;
    stream.write_all(format!("{}\n", req).as_bytes()).await?;
    stream.shutdown().await?;

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await?;
    parse_reply(&raw)
}

pub fn parse_reply(raw: &str) -> Result<Reply> {
    let mut body: Vec<String> = raw.lines().map(str::to_string).collect();
    let last = body
        .pop()
        .ok_or_else(|| anyhow!("empty reply from control socket"))?;
    if let Some(msg) = last.strip_prefix("err") {
        bail!("{}", msg.trim());
    }
    let status = last
        .strip_prefix("ok")
        .ok_or_else(|| anyhow!("malformed reply: {}", last))?
        .trim()
        .to_string();
    Ok(Reply { body, status })
}
