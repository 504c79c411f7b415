//! CLI for the vidrelay media pipeline.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vidrelay_core::{config, logging};

use commands::{
    run_cancel, run_cookies, run_fetch, run_history, run_logs, run_purge, run_serve, run_status,
    run_submit,
};

/// Top-level CLI for vidrelay.
#[derive(Debug, Parser)]
#[command(name = "vidrelay")]
#[command(about = "vidrelay: fetch videos, split them to size and relay them to a sink", long_about = None)]
pub struct Cli {
    /// Use this config file instead of the XDG default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the queue worker and listen on the control socket until Ctrl-C.
    Serve,

    /// Submit a URL to a running `vidrelay serve`.
    Submit {
        /// Video page URL.
        url: String,
        /// Identity of the person asking.
        #[arg(long)]
        requester: i64,
        /// Destination chat; defaults to the requester's own chat.
        #[arg(long, allow_negative_numbers = true)]
        chat: Option<i64>,
        /// Deliver again even if this video already reached the chat.
        #[arg(long)]
        force: bool,
    },

    /// Show the running and queued jobs of a running `vidrelay serve`.
    Status,

    /// Withdraw a queued job by its ID.
    Cancel {
        /// Job identifier.
        id: u64,
    },

    /// Run a single job in this process and print its result.
    Fetch {
        /// Video page URL.
        url: String,
        /// Destination sink ID (outbox subdirectory).
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        sink: i64,
        /// Deliver again even if this video already reached the sink.
        #[arg(long)]
        force: bool,
    },

    /// List recorded outcomes, newest first.
    History,

    /// Forget the recorded outcome of a video for one sink.
    Purge {
        /// Sink ID.
        #[arg(allow_negative_numbers = true)]
        sink: i64,
        /// Video URL or key (e.g. `youtube:dQw4w9WgXcQ`).
        video: String,
    },

    /// Report on the configured cookies file and when its auth cookies expire.
    Cookies,

    /// Print the most recent lines of the log file.
    Logs {
        /// Number of lines to show.
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve => run_serve(&cfg, &control_socket::default_socket_path()?).await?,
            CliCommand::Submit {
                url,
                requester,
                chat,
                force,
            } => {
                let socket = control_socket::default_socket_path()?;
                run_submit(&socket, requester, chat.unwrap_or(requester), &url, force).await?;
            }
            CliCommand::Status => run_status(&control_socket::default_socket_path()?).await?,
            CliCommand::Cancel { id } => {
                run_cancel(&control_socket::default_socket_path()?, id).await?
            }
            CliCommand::Fetch { url, sink, force } => run_fetch(&cfg, &url, sink, force).await?,
            CliCommand::History => run_history(&cfg).await?,
            CliCommand::Purge { sink, video } => run_purge(&cfg, sink, &video).await?,
            CliCommand::Cookies => run_cookies(&cfg)?,
            CliCommand::Logs { lines } => run_logs(&logging::log_file_path()?, lines)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
