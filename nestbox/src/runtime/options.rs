//! Configuration for nestbox.

use crate::runtime::constants::{envs as const_envs, poll_defaults, runtime, service};
use crate::runtime::layout::dirs as const_dirs;
use dirs::home_dir;
use nestbox_shared::errors::{NestboxError, NestboxResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Runtime Options
// ============================================================================

/// Configuration options for [`NestboxRuntime`](crate::NestboxRuntime).
///
/// Users can create it with defaults and modify fields as needed. Every field
/// has a serde default so a deployment file only needs to name what differs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NestboxOptions {
    /// State, keys, logs and the known_hosts file live here.
    ///
    /// Default: `$NESTBOX_HOME`, else `~/.nestbox`
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,

    /// Container runtime executable on the host.
    ///
    /// Default: `nixos-container`
    #[serde(default = "default_runtime_command")]
    pub runtime_command: String,

    #[serde(default)]
    pub ssh: SshOptions,

    #[serde(default)]
    pub poll: PollOptions,

    /// Unit whose `ActiveState` marks the container ready for the credential push.
    ///
    /// Default: `sshd.service`
    #[serde(default = "default_readiness_unit")]
    pub readiness_unit: String,

    /// Where the client public key is appended inside the container.
    #[serde(default = "default_authorized_keys_path")]
    pub authorized_keys_path: String,
}

/// Options for the ssh transport into containers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SshOptions {
    /// Port of the in-container ssh daemon reached through the proxy command.
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Flags added to every container-channel ssh invocation.
    ///
    /// Default: `-o StrictHostKeyChecking=accept-new`. The host key is only
    /// captured after the first start, so the credential push must be able to
    /// connect before it is registered.
    #[serde(default = "default_extra_flags")]
    pub extra_flags: Vec<String>,
}

/// Interval and deadlines for status polling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollOptions {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    #[serde(default = "default_destroy_timeout_secs")]
    pub destroy_timeout_secs: u64,

    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_home_dir() -> PathBuf {
    std::env::var(const_envs::NESTBOX_HOME)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = home_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(const_dirs::NESTBOX_DIR);
            path
        })
}

fn default_runtime_command() -> String {
    runtime::DEFAULT_COMMAND.to_string()
}

fn default_readiness_unit() -> String {
    service::READINESS_UNIT.to_string()
}

fn default_authorized_keys_path() -> String {
    service::AUTHORIZED_KEYS.to_string()
}

fn default_ssh_port() -> u16 {
    service::SSH_PORT
}

fn default_extra_flags() -> Vec<String> {
    vec!["-o".to_string(), "StrictHostKeyChecking=accept-new".to_string()]
}

fn default_interval_ms() -> u64 {
    poll_defaults::INTERVAL_MS
}

fn default_stop_timeout_secs() -> u64 {
    poll_defaults::STOP_TIMEOUT_SECS
}

fn default_destroy_timeout_secs() -> u64 {
    poll_defaults::DESTROY_TIMEOUT_SECS
}

fn default_ready_timeout_secs() -> u64 {
    poll_defaults::READY_TIMEOUT_SECS
}

impl Default for NestboxOptions {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            runtime_command: default_runtime_command(),
            ssh: SshOptions::default(),
            poll: PollOptions::default(),
            readiness_unit: default_readiness_unit(),
            authorized_keys_path: default_authorized_keys_path(),
        }
    }
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            extra_flags: default_extra_flags(),
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
            destroy_timeout_secs: default_destroy_timeout_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

impl PollOptions {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

impl NestboxOptions {
    /// Validate option combinations before any filesystem work.
    pub fn sanitize(&self) -> NestboxResult<()> {
        if !self.home_dir.is_absolute() {
            return Err(NestboxError::Config(format!(
                "home_dir must be absolute path, got: {}",
                self.home_dir.display()
            )));
        }
        if self.runtime_command.trim().is_empty() {
            return Err(NestboxError::Config("runtime_command is empty".into()));
        }
        if self.poll.interval_ms == 0 {
            return Err(NestboxError::Config("poll.interval_ms must be > 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// Declared shape of a container, as written in a deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerDeclaration {
    pub name: String,

    /// `localhost`, a literal ssh address, or `__machine-<name>`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Build and apply the per-container runtime configuration on create.
    #[serde(default)]
    pub write_container_config: bool,

    /// Deployment expressions handed to the build collaborator.
    #[serde(default)]
    pub nix_exprs: Vec<PathBuf>,
}

fn default_host() -> String {
    crate::runtime::constants::host::LOCALHOST.to_string()
}

impl ContainerDeclaration {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            write_container_config: false,
            nix_exprs: Vec::new(),
        }
    }

    pub fn sanitize(&self) -> NestboxResult<()> {
        if self.name.is_empty() {
            return Err(NestboxError::Config("container name is empty".into()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(NestboxError::Config(format!(
                "container name '{}' may only contain [A-Za-z0-9_-]",
                self.name
            )));
        }
        if self.host.trim().is_empty() {
            return Err(NestboxError::Config(format!(
                "container '{}' has an empty host",
                self.name
            )));
        }
        Ok(())
    }
}

/// A machine managed outside nestbox that containers may be hosted on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MachineDeclaration {
    pub name: String,

    /// ssh destination (without `root@`).
    pub address: String,

    #[serde(default)]
    pub flags: Vec<String>,

    /// Whether the machine is currently up. Containers referencing a
    /// machine that is not started fail with `HostUnavailable`.
    #[serde(default = "default_started")]
    pub started: bool,
}

fn default_started() -> bool {
    true
}

/// Knobs for [`Container::create`](crate::Container::create).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Re-run start and re-query the address even when state says it is current.
    pub check: bool,

    /// Permit a restart when the container configuration changed.
    pub allow_reboot: bool,

    /// Replace a container that `check()` found missing from the runtime.
    /// Without it, create refuses rather than orphan a container the runtime
    /// may still run.
    pub allow_recreate: bool,
}
