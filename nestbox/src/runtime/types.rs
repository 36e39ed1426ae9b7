//! Public result types of container operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::container::ContainerStatus;

/// Public view of a container, without secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub status: ContainerStatus,
    pub runtime_id: Option<String>,
    pub host: Option<String>,
    pub private_address: Option<String>,
    pub applied_config: Option<String>,
    pub client_public_key: Option<String>,
    pub public_host_key: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Outcome of [`Container::check`](crate::Container::check).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// The runtime knows the container.
    pub exists: bool,
    /// The runtime reports it running.
    pub is_up: bool,
    /// A command could be run inside it.
    pub is_reachable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestroyOutcome {
    Destroyed,
    /// Not confirmed; nothing was touched.
    Aborted,
}

/// Result of reconciling the declared container configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSyncOutcome {
    Applied,
    Skipped,
}

/// Settings the deployment must carry for a container to stay reachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalSpec {
    /// Keys for `users.users.root.openssh.authorizedKeys.keys`.
    pub root_authorized_keys: Vec<String>,
}
