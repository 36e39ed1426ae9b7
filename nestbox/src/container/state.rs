//! Container lifecycle status and persisted state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nestbox_shared::errors::{NestboxError, NestboxResult};
use serde::{Deserialize, Serialize};

use crate::db::AttributeStore;

/// Lifecycle status of a container.
///
/// ```text
/// Missing ──create──► Stopped ──start──► Starting ──ready──► Up
///                        ▲                   │ ▲             │
///                        │                   ▼ └──re-check───┘
///                        └──────────── Stopping ◄────stop────┘
/// any ──destroy/check──► Missing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// No runtime container exists.
    #[default]
    Missing,
    /// Created but not running.
    Stopped,
    /// Start issued; not confirmed ready yet. Also the status a failed start
    /// leaves behind.
    Starting,
    /// Started and accepting logins.
    Up,
    /// Stop issued, waiting for the runtime to report it down.
    Stopping,
}

impl ContainerStatus {
    /// Whether the private address can be trusted in this status.
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Starting | ContainerStatus::Up)
    }

    /// Starting and Stopping may be re-entered: a start or stop that failed
    /// half-way is retried from where it left off.
    pub fn can_transition_to(&self, target: ContainerStatus) -> bool {
        use ContainerStatus::*;
        matches!(
            (self, target),
            (_, Missing)
                | (Missing, Stopped)
                | (Stopped, Starting)
                | (Starting, Up)
                | (Up, Starting)
                | (Starting, Starting)
                | (Starting, Stopping)
                | (Stopped, Stopping)
                | (Stopping, Stopping)
                | (Up, Stopping)
                | (Stopping, Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Missing => "missing",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Starting => "starting",
            ContainerStatus::Up => "up",
            ContainerStatus::Stopping => "stopping",
        }
    }
}

impl std::str::FromStr for ContainerStatus {
    type Err = NestboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing" => Ok(ContainerStatus::Missing),
            "stopped" => Ok(ContainerStatus::Stopped),
            "starting" => Ok(ContainerStatus::Starting),
            "up" => Ok(ContainerStatus::Up),
            "stopping" => Ok(ContainerStatus::Stopping),
            other => Err(NestboxError::InvalidState(format!(
                "unknown container status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute names in the store.
pub(crate) mod keys {
    pub const STATUS: &str = "status";
    pub const RUNTIME_ID: &str = "runtime_id";
    pub const HOST: &str = "host";
    pub const PRIVATE_ADDRESS: &str = "private_address";
    pub const APPLIED_CONFIG: &str = "applied_config";
    pub const CLIENT_PRIVATE_KEY: &str = "client_private_key";
    pub const CLIENT_PUBLIC_KEY: &str = "client_public_key";
    pub const PUBLIC_HOST_KEY: &str = "public_host_key";
    pub const LAST_UPDATED: &str = "last_updated";
}

/// Snapshot of everything persisted for one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub name: String,
    pub status: ContainerStatus,
    pub runtime_id: Option<String>,
    pub host: Option<String>,
    pub private_address: Option<String>,
    pub applied_config: Option<String>,
    #[serde(skip_serializing, default)]
    pub client_private_key: Option<String>,
    pub client_public_key: Option<String>,
    pub public_host_key: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ContainerState {
    pub fn load(store: &dyn AttributeStore, name: &str) -> NestboxResult<Self> {
        let attrs = store.attributes(name)?;
        let get = |key: &str| attrs.get(key).cloned();

        let status = match get(keys::STATUS) {
            Some(s) => s.parse()?,
            None => ContainerStatus::Missing,
        };
        let last_updated = match get(keys::LAST_UPDATED) {
            Some(ts) => Some(
                DateTime::parse_from_rfc3339(&ts)
                    .map_err(|e| {
                        NestboxError::Storage(format!("bad timestamp for '{}': {}", name, e))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            status,
            runtime_id: get(keys::RUNTIME_ID),
            host: get(keys::HOST),
            private_address: get(keys::PRIVATE_ADDRESS),
            applied_config: get(keys::APPLIED_CONFIG),
            client_private_key: get(keys::CLIENT_PRIVATE_KEY),
            client_public_key: get(keys::CLIENT_PUBLIC_KEY),
            public_host_key: get(keys::PUBLIC_HOST_KEY),
            last_updated,
        })
    }
}

/// Write-through view of one container's state.
///
/// Every setter persists its field before updating the in-memory copy, so
/// the store always holds the last value that was successfully set even if
/// the operation that set it fails later.
pub struct TrackedState {
    store: Arc<dyn AttributeStore>,
    state: ContainerState,
}

impl TrackedState {
    pub fn load(store: Arc<dyn AttributeStore>, name: &str) -> NestboxResult<Self> {
        let state = ContainerState::load(store.as_ref(), name)?;
        Ok(Self { store, state })
    }

    pub fn get(&self) -> &ContainerState {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn status(&self) -> ContainerStatus {
        self.state.status
    }

    fn put(&self, key: &str, value: Option<&str>) -> NestboxResult<()> {
        self.store.set(&self.state.name, key, value)
    }

    /// Validated status change.
    pub fn transition_to(&mut self, status: ContainerStatus) -> NestboxResult<()> {
        if !self.state.status.can_transition_to(status) {
            return Err(NestboxError::InvalidState(format!(
                "container '{}' cannot go from {} to {}",
                self.state.name, self.state.status, status
            )));
        }
        self.force_status(status)
    }

    /// Status change without validation, for reconciliation with what the
    /// runtime reports.
    pub fn force_status(&mut self, status: ContainerStatus) -> NestboxResult<()> {
        let now = Utc::now();
        self.put(keys::STATUS, Some(status.as_str()))?;
        self.put(keys::LAST_UPDATED, Some(&now.to_rfc3339()))?;
        tracing::debug!(
            container = %self.state.name,
            from = %self.state.status,
            to = %status,
            "Status changed"
        );
        self.state.status = status;
        self.state.last_updated = Some(now);
        Ok(())
    }

    pub fn set_runtime_id(&mut self, value: Option<String>) -> NestboxResult<()> {
        self.put(keys::RUNTIME_ID, value.as_deref())?;
        self.state.runtime_id = value;
        Ok(())
    }

    pub fn set_host(&mut self, value: Option<String>) -> NestboxResult<()> {
        self.put(keys::HOST, value.as_deref())?;
        self.state.host = value;
        Ok(())
    }

    pub fn set_private_address(&mut self, value: Option<String>) -> NestboxResult<()> {
        self.put(keys::PRIVATE_ADDRESS, value.as_deref())?;
        self.state.private_address = value;
        Ok(())
    }

    pub fn set_applied_config(&mut self, value: Option<String>) -> NestboxResult<()> {
        self.put(keys::APPLIED_CONFIG, value.as_deref())?;
        self.state.applied_config = value;
        Ok(())
    }

    pub fn set_credential(&mut self, private_key: String, public_key: String) -> NestboxResult<()> {
        self.put(keys::CLIENT_PRIVATE_KEY, Some(&private_key))?;
        self.put(keys::CLIENT_PUBLIC_KEY, Some(&public_key))?;
        self.state.client_private_key = Some(private_key);
        self.state.client_public_key = Some(public_key);
        Ok(())
    }

    pub fn set_public_host_key(&mut self, value: Option<String>) -> NestboxResult<()> {
        self.put(keys::PUBLIC_HOST_KEY, value.as_deref())?;
        self.state.public_host_key = value;
        Ok(())
    }
}
