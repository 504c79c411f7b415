//! Scripted `CommandRunner` for unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::RunError;

type Handler = dyn Fn(&CommandSpec) -> Result<CommandOutput, RunError> + Send + Sync;

/// Answers every invocation with `handler` and records what was run.
pub(crate) struct FakeRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, RunError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, RunError> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.handler)(&spec)
    }
}

pub(crate) fn ok(stdout: impl Into<Vec<u8>>) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.into(),
        stderr: Vec::new(),
    }
}

pub(crate) fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Value following `flag` in the invocation's arguments.
pub(crate) fn arg_after(spec: &CommandSpec, flag: &str) -> Option<String> {
    let args = spec.display_args();
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
