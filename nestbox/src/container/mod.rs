//! Container handle and lifecycle.

mod config_sync;
mod lifecycle;
mod poll;
mod start;
mod state;

pub use poll::{PollSpec, poll_until};
pub use state::{ContainerState, ContainerStatus};

use std::collections::BTreeSet;
use std::path::Path;

use nestbox_shared::errors::NestboxResult;
use tokio_util::sync::CancellationToken;

use crate::runtime::RuntimeInner;
use crate::runtime::options::{ContainerDeclaration, CreateOptions};
use crate::runtime::types::{
    CheckResult, ConfigSyncOutcome, ContainerInfo, DestroyOutcome, PhysicalSpec,
};
use lifecycle::LifecycleController;

/// Handle to one container, obtained from
/// [`NestboxRuntime::container`](crate::NestboxRuntime::container).
///
/// The handle holds no state of its own; every call reads the store. Calls on
/// the same container must not overlap.
#[derive(Clone)]
pub struct Container {
    name: String,
    runtime: RuntimeInner,
    cancel: CancellationToken,
}

impl Container {
    pub(crate) fn new(name: String, runtime: RuntimeInner) -> Self {
        Self {
            name,
            runtime,
            cancel: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token aborting in-flight waits and starts of this handle and its
    /// clones. Once cancelled, the handle stays cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn controller(&self) -> LifecycleController<'_> {
        LifecycleController::new(&self.name, &self.runtime, &self.cancel)
    }

    /// Bring the container to its declared shape: created, configured,
    /// running, with a known address and a trusted host key.
    pub async fn create(
        &self,
        declaration: &ContainerDeclaration,
        options: CreateOptions,
    ) -> NestboxResult<()> {
        self.controller().create(declaration, options).await
    }

    pub async fn start(&self) -> NestboxResult<()> {
        self.controller().start().await
    }

    pub async fn stop(&self) -> NestboxResult<()> {
        self.controller().stop().await
    }

    /// Destroy the runtime container. Without `confirmed` nothing happens
    /// and [`DestroyOutcome::Aborted`] is returned.
    pub async fn destroy(&self, confirmed: bool) -> NestboxResult<DestroyOutcome> {
        self.controller().destroy(confirmed).await
    }

    /// Ask the runtime about the container and fold the answer back into
    /// the stored status.
    pub async fn check(&self) -> NestboxResult<CheckResult> {
        self.controller().check().await
    }

    /// Run `command` in a root login shell inside the container and return
    /// its stdout.
    pub async fn run_command(&self, command: &str) -> NestboxResult<String> {
        self.controller().run_command(command).await
    }

    /// Make `config` the active runtime configuration of the container.
    pub async fn reconcile_config(
        &self,
        config: &Path,
        allow_restart: bool,
    ) -> NestboxResult<ConfigSyncOutcome> {
        self.controller()
            .reconcile_config(config, allow_restart)
            .await
    }

    /// Machines that have to be created first. Uses the stored host when no
    /// declaration is given.
    pub fn create_after(
        &self,
        declaration: Option<&ContainerDeclaration>,
    ) -> NestboxResult<BTreeSet<String>> {
        self.controller().create_after(declaration)
    }

    /// Network address `self` should use to reach `other`. Only containers
    /// sharing a host can reach each other's private address; containers
    /// have no public address, so every other case is `None`.
    pub fn address_to(&self, other: &Container) -> NestboxResult<Option<String>> {
        let mine = self.controller().load()?;
        let theirs = other.controller().load()?;

        if mine.get().host.is_some() && mine.get().host == theirs.get().host {
            return Ok(theirs.get().private_address.clone());
        }
        Ok(None)
    }

    /// Name under which ssh reaches the container and its host key is
    /// trusted. Routed through the host (`host~address`) unless the container
    /// runs on localhost.
    pub fn ssh_name(&self) -> NestboxResult<Option<String>> {
        let controller = self.controller();
        let state = controller.load()?;
        controller.ssh_name(&state)
    }

    pub fn physical_spec(&self) -> NestboxResult<PhysicalSpec> {
        let state = self.controller().load()?;
        Ok(PhysicalSpec {
            root_authorized_keys: state.get().client_public_key.iter().cloned().collect(),
        })
    }

    pub fn info(&self) -> NestboxResult<ContainerInfo> {
        Ok(self.controller().load()?.get().clone().into())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("name", &self.name).finish()
    }
}

impl From<ContainerState> for ContainerInfo {
    fn from(state: ContainerState) -> Self {
        Self {
            name: state.name,
            status: state.status,
            runtime_id: state.runtime_id,
            host: state.host,
            private_address: state.private_address,
            applied_config: state.applied_config,
            client_public_key: state.client_public_key,
            public_host_key: state.public_host_key,
            last_updated: state.last_updated,
        }
    }
}
