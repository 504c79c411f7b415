//! Subprocess capability used by the fetcher and splitter.
//!
//! External tools are black boxes: the pipeline only needs to start one with
//! arguments, capture its output, bound its runtime and kill its whole process
//! tree when the surrounding job is abandoned. `CommandRunner` is that seam;
//! `TokioCommandRunner` is the production implementation.

mod guard;
mod runner;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use std::ffi::OsString;
use std::time::Duration;

use crate::error::RunError;

pub use runner::{check_program, TokioCommandRunner};

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    /// Optional per-command wall-clock limit (the job timeout applies on top).
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Arguments as lossy strings (logging and test assertions).
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Execute-with-timeout, capture stdout/stderr, kill subtree on abandon.
///
/// Dropping the returned future must terminate the process tree; the queue
/// relies on that to enforce the job timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, RunError>;
}
