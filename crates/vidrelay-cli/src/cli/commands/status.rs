//! `vidrelay status` – show the running and queued jobs.

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::cli::control_socket::{send_request, ControlRequest};

/// One job line of a status reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub id: u64,
    pub state: String,
    pub elapsed_secs: u64,
    pub sink: i64,
    pub url: String,
}

pub fn parse_status(body: &[String]) -> Result<Vec<StatusRow>> {
    body.iter()
        .map(|line| -> Result<StatusRow> {
            let f: Vec<&str> = line.splitn(6, '\t').collect();
            match f.as_slice() {
                ["job", id, state, elapsed, sink, url] => Ok(StatusRow {
                    id: id.parse()?,
                    state: state.to_string(),
                    elapsed_secs: elapsed.parse()?,
                    sink: sink.parse()?,
                    url: url.to_string(),
                }),
                _ => Err(anyhow!("malformed status line: {}", line)),
            }
        })
        .collect()
}

pub async fn run_status(socket_path: &Path) -> Result<()> {
    let reply = send_request(socket_path, &ControlRequest::Status).await?;
    let rows = parse_status(&reply.body)?;
    if rows.is_empty() {
        println!("No jobs queued.");
    } else {
        println!("{:<6} {:<8} {:<8} {:<14} {}", "ID", "STATE", "ELAPSED", "SINK", "URL");
        for r in rows {
            println!(
                "{:<6} {:<8} {:<8} {:<14} {}",
                r.id,
                r.state,
                format!("{}s", r.elapsed_secs),
                r.sink,
                r.url
            );
        }
    }
    Ok(())
}
