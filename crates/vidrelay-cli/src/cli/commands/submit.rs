//! `vidrelay submit` – hand a URL to the running server.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::control_socket::{send_request, ControlRequest};

pub async fn run_submit(
    socket_path: &Path,
    requester: i64,
    chat: i64,
    url: &str,
    force: bool,
) -> Result<()> {
    let req = ControlRequest::Submit {
        requester,
        chat,
        url: url.to_string(),
        force,
    };
    let reply = send_request(socket_path, &req)
        .await
        .context("submit rejected")?;
    println!("Queued job {}.", reply.status);
    Ok(())
}
