//! Error types used across the Nestbox runtime.

use thiserror::Error;

/// Result type for Nestbox operations.
pub type NestboxResult<T> = Result<T, NestboxError>;

#[derive(Debug, Error)]
pub enum NestboxError {
    /// An indirect host is not started yet. Not retried: start the host first.
    #[error("host machine '{host}' of container '{container}' is not up")]
    HostUnavailable { container: String, host: String },

    #[error("host reference cycle detected: {}", .chain.join(" -> "))]
    HostCycle { chain: Vec<String> },

    #[error(
        "container '{name}' lives on host '{current}'; moving it to '{requested}' is not supported, destroy and recreate it instead"
    )]
    HostChanged {
        name: String,
        current: String,
        requested: String,
    },

    #[error("command '{command}' failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("restart of container '{name}' is needed, run with --allow-reboot")]
    RestartRequired { name: String },

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("timed out after {waited_secs}s waiting for {operation}")]
    Timeout { operation: String, waited_secs: u64 },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl NestboxError {
    /// Build a [`NestboxError::CommandFailed`] from an exit code.
    ///
    /// `None` means the process was terminated by a signal.
    pub fn command_failed(command: impl Into<String>, code: Option<i32>, stderr: &str) -> Self {
        let status = match code {
            Some(code) => format!("exit status {}", code),
            None => "termination by signal".to_string(),
        };
        NestboxError::CommandFailed {
            command: command.into(),
            status,
            stderr: stderr.trim().to_string(),
        }
    }
}

// Implement From for common error types to enable `?` operator
impl From<std::io::Error> for NestboxError {
    fn from(err: std::io::Error) -> Self {
        NestboxError::Internal(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for NestboxError {
    fn from(err: serde_json::Error) -> Self {
        NestboxError::Internal(format!("JSON error: {}", err))
    }
}

impl From<String> for NestboxError {
    fn from(err: String) -> Self {
        NestboxError::Internal(err)
    }
}

impl From<&str> for NestboxError {
    fn from(err: &str) -> Self {
        NestboxError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_unavailable_names_both_sides() {
        let err = NestboxError::HostUnavailable {
            container: "web".into(),
            host: "hypervisor".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'hypervisor'"));
        assert!(msg.contains("'web'"));
    }

    #[test]
    fn test_command_failed_exit_code() {
        let err = NestboxError::command_failed("nixos-container start abc", Some(3), "boom\n");
        assert_eq!(
            err.to_string(),
            "command 'nixos-container start abc' failed with exit status 3: boom"
        );
    }

    #[test]
    fn test_command_failed_signal() {
        let err = NestboxError::command_failed("sleep 100", None, "");
        assert!(err.to_string().contains("termination by signal"));
    }

    #[test]
    fn test_host_cycle_renders_chain() {
        let err = NestboxError::HostCycle {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "host reference cycle detected: a -> b -> a");
    }
}
