//! `CommandRunner` backed by `tokio::process`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

use super::guard::ProcessGroupGuard;
use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::RunError;

/// Check that an external program is available on PATH (or as a path).
pub fn check_program(program: &str) -> Result<PathBuf, RunError> {
    which::which(program).map_err(|_| RunError::NotFound(program.to_string()))
}

/// Runs each command as its own process group with captured output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, RunError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(program = %spec.program, args = ?spec.display_args(), "spawning");

        let child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RunError::NotFound(spec.program.clone())
            } else {
                RunError::Spawn {
                    program: spec.program.clone(),
                    source,
                }
            }
        })?;

        let guard = ProcessGroupGuard::new(child.id());
        let started = Instant::now();
        let wait = child.wait_with_output();

        let result = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(res) => res,
                Err(_) => {
                    drop(guard);
                    tracing::warn!(program = %spec.program, ?limit, "command timed out, killed");
                    return Err(RunError::TimedOut {
                        program: spec.program,
                        elapsed: started.elapsed(),
                    });
                }
            },
            None => wait.await,
        };

        let output = result.map_err(|source| RunError::Io {
            program: spec.program.clone(),
            source,
        })?;
        guard.disarm();

        tracing::debug!(
            program = %spec.program,
            code = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
