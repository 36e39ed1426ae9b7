//! Command execution on hosts and inside containers.

mod commands;
mod process;
mod runner;

pub use commands::{RuntimeCommands, RuntimeStatus};
pub use process::ProcessExec;
pub use runner::{CommandOutcome, RemoteCommandRunner, RunOptions};

use std::path::Path;

use async_trait::async_trait;
use nestbox_shared::errors::NestboxResult;
use nestbox_shared::transport::Endpoint;

/// Result of one command, whatever its exit status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code. `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout. Empty when capture was not requested.
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs shell command lines on an endpoint.
///
/// Implementations must only fail for transport problems they cannot express
/// as an exit status (e.g. the program could not be spawned). A command that
/// ran and exited non-zero is reported through [`ExecOutput::code`].
#[async_trait]
pub trait RemoteExec: Send + Sync {
    async fn exec(&self, target: &Endpoint, command: &str, capture: bool)
    -> NestboxResult<ExecOutput>;

    /// Copy a store path and its closure to the target. No-op for
    /// [`Endpoint::Local`].
    async fn copy_path(&self, target: &Endpoint, path: &Path) -> NestboxResult<()>;
}
