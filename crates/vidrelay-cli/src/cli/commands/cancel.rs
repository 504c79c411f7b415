//! `vidrelay cancel` – withdraw a queued job.

use anyhow::Result;
use std::path::Path;
use vidrelay_core::job::JobId;

use crate::cli::control_socket::{send_request, ControlRequest};

pub async fn run_cancel(socket_path: &Path, id: JobId) -> Result<()> {
    send_request(socket_path, &ControlRequest::Cancel(id)).await?;
    println!("Job {} cancelled.", id);
    Ok(())
}
