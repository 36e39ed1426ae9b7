//! Lifecycle operations of one container.
//!
//! Every operation reloads the container's state from the store and writes
//! each field back as soon as it changes. Nothing is rolled back on failure:
//! the store keeps the last value that was set, and the next operation
//! continues from there.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nestbox_shared::errors::{NestboxError, NestboxResult};
use tokio_util::sync::CancellationToken;

use super::config_sync::ConfigSyncController;
use super::poll::{PollSpec, poll_until};
use super::start::ParallelStart;
use super::state::{ContainerStatus, TrackedState};
use crate::build::BuildRequest;
use crate::credential::{self, KeyPair};
use crate::exec::{RemoteCommandRunner, RunOptions, RuntimeStatus};
use crate::host::{HostRef, HostResolver};
use crate::runtime::core::RuntimeInnerImpl;
use crate::runtime::options::{ContainerDeclaration, CreateOptions};
use crate::runtime::types::{CheckResult, ConfigSyncOutcome, DestroyOutcome};

pub(crate) struct LifecycleController<'a> {
    name: &'a str,
    runtime: &'a RuntimeInnerImpl,
    cancel: &'a CancellationToken,
}

impl<'a> LifecycleController<'a> {
    pub fn new(name: &'a str, runtime: &'a RuntimeInnerImpl, cancel: &'a CancellationToken) -> Self {
        Self {
            name,
            runtime,
            cancel,
        }
    }

    pub fn load(&self) -> NestboxResult<TrackedState> {
        TrackedState::load(self.runtime.store.clone(), self.name)
    }

    pub fn runner<'b>(&'b self, host: &'b str) -> RemoteCommandRunner<'b> {
        let rt = self.runtime;
        RemoteCommandRunner::new(
            self.name,
            host,
            HostResolver::new(rt, &rt.proxy),
            rt.exec.as_ref(),
            &rt.commands,
            &rt.proxy,
        )
    }

    fn host_of(&self, state: &TrackedState) -> NestboxResult<String> {
        state.get().host.clone().ok_or_else(|| {
            NestboxError::InvalidState(format!("container '{}' has no host recorded", self.name))
        })
    }

    fn poll_spec(&self, timeout: Duration) -> PollSpec {
        PollSpec::new(self.runtime.options.poll.interval(), timeout)
    }

    /// Write the client private key where `ssh -i` expects it.
    fn key_file(&self, state: &TrackedState) -> NestboxResult<PathBuf> {
        let private_key = state.get().client_private_key.as_deref().ok_or_else(|| {
            NestboxError::Credential(format!("container '{}' has no client key", self.name))
        })?;
        let path = self.runtime.layout.key_file(self.name);
        credential::write_private_key(&path, private_key)?;
        Ok(path)
    }

    // ------------------------------------------------------------------
    // create
    // ------------------------------------------------------------------

    pub async fn create(
        &self,
        declaration: &ContainerDeclaration,
        options: CreateOptions,
    ) -> NestboxResult<()> {
        declaration.sanitize()?;
        if declaration.name != self.name {
            return Err(NestboxError::Config(format!(
                "declaration for '{}' used to create container '{}'",
                declaration.name, self.name
            )));
        }

        let mut state = self.load()?;

        if state.get().runtime_id.is_some()
            && let Some(current) = state.get().host.as_deref()
            && current != declaration.host
        {
            return Err(NestboxError::HostChanged {
                name: self.name.to_string(),
                current: current.to_string(),
                requested: declaration.host.clone(),
            });
        }

        if state.get().client_private_key.is_none() {
            let pair = KeyPair::generate(&format!("nestbox-{}", self.name));
            tracing::debug!(
                container = %self.name,
                fingerprint = %pair.fingerprint()?,
                "Generated client key"
            );
            state.set_credential(pair.private_key, pair.public_key)?;
        }

        if state.get().runtime_id.is_some() && state.status() == ContainerStatus::Missing {
            if !options.allow_recreate {
                return Err(NestboxError::InvalidState(format!(
                    "container '{}' was reported gone by the runtime; run check again once \
                     its host is reachable, or create with allow_recreate to replace it",
                    self.name
                )));
            }
            tracing::warn!(container = %self.name, "Recreating container the runtime no longer knows");
            let host = self.host_of(&state)?;
            self.forget_host_key(&self.runner(&host), &state)?;
            self.clear_runtime(&mut state)?;
        }

        if state.get().runtime_id.is_none() {
            self.provision(&mut state, declaration).await?;
        }

        let host = self.host_of(&state)?;
        let runner = self.runner(&host);

        if declaration.write_container_config {
            let config = self
                .runtime
                .builder
                .build(
                    declaration,
                    BuildRequest::ContainerConfig {
                        name: self.name.to_string(),
                    },
                )
                .await?;
            ConfigSyncController::new(self)
                .reconcile(&runner, &mut state, &config, options.allow_reboot)
                .await?;
        }

        if state.status() == ContainerStatus::Stopped || options.check {
            self.start_with(&runner, &mut state).await?;
        }

        if state.get().private_address.is_none() || options.check {
            self.refresh_private_address(&runner, &mut state).await?;
        }

        if state.get().public_host_key.is_none() {
            self.register_host_key(&runner, &mut state).await?;
        }

        Ok(())
    }

    /// Build the initial system and create the runtime container from it.
    async fn provision(
        &self,
        state: &mut TrackedState,
        declaration: &ContainerDeclaration,
    ) -> NestboxResult<()> {
        let public_key = state.get().client_public_key.clone().ok_or_else(|| {
            NestboxError::Credential(format!("container '{}' has no public key", self.name))
        })?;

        tracing::info!(container = %self.name, "Building initial configuration");
        let image = self
            .runtime
            .builder
            .build(
                declaration,
                BuildRequest::InitialSystem {
                    name: self.name.to_string(),
                    public_key,
                },
            )
            .await?;

        state.set_host(Some(declaration.host.clone()))?;
        let runner = self.runner(&declaration.host);
        runner.copy_image(&image).await?;

        tracing::info!(container = %self.name, host = %declaration.host, "Creating container");
        let runtime_id = runner
            .host_output(&runner.commands().create(self.name, &image))
            .await?;
        if runtime_id.is_empty() {
            return Err(NestboxError::Internal(format!(
                "runtime create printed no id for container '{}'",
                self.name
            )));
        }

        state.set_runtime_id(Some(runtime_id))?;
        state.transition_to(ContainerStatus::Stopped)
    }

    // ------------------------------------------------------------------
    // start / stop
    // ------------------------------------------------------------------

    pub async fn start(&self) -> NestboxResult<()> {
        let mut state = self.load()?;
        if state.get().runtime_id.is_none() {
            tracing::debug!(container = %self.name, "Not created, nothing to start");
            return Ok(());
        }
        let host = self.host_of(&state)?;
        let runner = self.runner(&host);
        self.start_with(&runner, &mut state).await
    }

    pub async fn start_with(
        &self,
        runner: &RemoteCommandRunner<'_>,
        state: &mut TrackedState,
    ) -> NestboxResult<()> {
        let Some(runtime_id) = state.get().runtime_id.clone() else {
            return Ok(());
        };
        let public_key = state.get().client_public_key.clone().ok_or_else(|| {
            NestboxError::Credential(format!("container '{}' has no public key", self.name))
        })?;
        let key_file = self.key_file(state)?;

        tracing::info!(container = %self.name, "Starting container");
        state.transition_to(ContainerStatus::Starting)?;

        let options = &self.runtime.options;
        let address = ParallelStart {
            runner,
            container: self.name,
            runtime_id: &runtime_id,
            key_file: &key_file,
            public_key: &public_key,
            readiness_unit: &options.readiness_unit,
            authorized_keys: &options.authorized_keys_path,
            ready: self.poll_spec(options.poll.ready_timeout()),
        }
        .run(self.cancel)
        .await?;

        if state.get().private_address.as_deref() != Some(address.as_str()) {
            tracing::info!(container = %self.name, address = %address, "Private address");
            state.set_private_address(Some(address))?;
        }
        state.transition_to(ContainerStatus::Up)?;
        tracing::info!(container = %self.name, "Container up");
        Ok(())
    }

    pub async fn stop(&self) -> NestboxResult<()> {
        let mut state = self.load()?;
        if state.get().runtime_id.is_none() {
            tracing::debug!(container = %self.name, "Not created, nothing to stop");
            return Ok(());
        }
        let host = self.host_of(&state)?;
        let runner = self.runner(&host);
        self.stop_with(&runner, &mut state).await
    }

    pub async fn stop_with(
        &self,
        runner: &RemoteCommandRunner<'_>,
        state: &mut TrackedState,
    ) -> NestboxResult<()> {
        let Some(runtime_id) = state.get().runtime_id.clone() else {
            return Ok(());
        };

        tracing::info!(container = %self.name, "Stopping container");
        state.transition_to(ContainerStatus::Stopping)?;
        runner
            .run_on_host(&runner.commands().stop(&runtime_id), RunOptions::LOGGED)
            .await?;
        self.wait_while_up(
            runner,
            &runtime_id,
            self.runtime.options.poll.stop_timeout(),
            "stop",
        )
        .await?;
        state.transition_to(ContainerStatus::Stopped)?;
        tracing::info!(container = %self.name, "Container stopped");
        Ok(())
    }

    // ------------------------------------------------------------------
    // destroy / check
    // ------------------------------------------------------------------

    pub async fn destroy(&self, confirmed: bool) -> NestboxResult<DestroyOutcome> {
        let mut state = self.load()?;
        let Some(runtime_id) = state.get().runtime_id.clone() else {
            return Ok(DestroyOutcome::Destroyed);
        };
        if !confirmed {
            tracing::info!(container = %self.name, "Destroy not confirmed");
            return Ok(DestroyOutcome::Aborted);
        }

        let host = self.host_of(&state)?;
        let runner = self.runner(&host);

        self.forget_host_key(&runner, &state)?;

        tracing::info!(container = %self.name, "Destroying container");
        runner
            .run_on_host(&runner.commands().destroy(&runtime_id), RunOptions::LOGGED)
            .await?;
        self.wait_while_up(
            &runner,
            &runtime_id,
            self.runtime.options.poll.destroy_timeout(),
            "destroy",
        )
        .await?;

        self.clear_runtime(&mut state)?;
        tracing::info!(container = %self.name, "Container destroyed");
        Ok(DestroyOutcome::Destroyed)
    }

    pub async fn check(&self) -> NestboxResult<CheckResult> {
        let mut state = self.load()?;
        let Some(runtime_id) = state.get().runtime_id.clone() else {
            if state.status() != ContainerStatus::Missing {
                state.force_status(ContainerStatus::Missing)?;
            }
            return Ok(CheckResult::default());
        };

        let host = self.host_of(&state)?;
        let runner = self.runner(&host);

        match self.runtime_status(&runner, &runtime_id).await? {
            RuntimeStatus::Gone => {
                // The runtime id and host key stay: a failed status query
                // reads as gone too, and the container may still exist.
                tracing::warn!(container = %self.name, "Runtime does not report the container");
                if state.status() != ContainerStatus::Missing {
                    state.force_status(ContainerStatus::Missing)?;
                }
                Ok(CheckResult::default())
            }
            RuntimeStatus::Down => {
                state.force_status(ContainerStatus::Stopped)?;
                Ok(CheckResult {
                    exists: true,
                    is_up: false,
                    is_reachable: false,
                })
            }
            status => {
                if let RuntimeStatus::Unknown(raw) = &status {
                    tracing::warn!(container = %self.name, status = %raw, "Unexpected runtime status, probing");
                }
                let reachable = runner
                    .run_in_container(&runtime_id, "true", RunOptions::PROBE)
                    .await?
                    .output()
                    .is_some();
                if reachable && state.status() != ContainerStatus::Up {
                    state.force_status(ContainerStatus::Up)?;
                }
                Ok(CheckResult {
                    exists: true,
                    is_up: true,
                    is_reachable: reachable,
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // commands and queries
    // ------------------------------------------------------------------

    pub async fn run_command(&self, command: &str) -> NestboxResult<String> {
        let state = self.load()?;
        let runtime_id = state.get().runtime_id.clone().ok_or_else(|| {
            NestboxError::InvalidState(format!("container '{}' has not been created", self.name))
        })?;
        let host = self.host_of(&state)?;
        let runner = self.runner(&host);
        let outcome = runner
            .run_in_container(&runtime_id, command, RunOptions::CAPTURED)
            .await?;
        Ok(outcome.output().unwrap_or_default().to_string())
    }

    pub async fn reconcile_config(
        &self,
        config: &Path,
        allow_restart: bool,
    ) -> NestboxResult<ConfigSyncOutcome> {
        let mut state = self.load()?;
        let host = self.host_of(&state)?;
        let runner = self.runner(&host);
        ConfigSyncController::new(self)
            .reconcile(&runner, &mut state, config, allow_restart)
            .await
    }

    /// Machines that must exist before this container can be created.
    pub fn create_after(
        &self,
        declaration: Option<&ContainerDeclaration>,
    ) -> NestboxResult<BTreeSet<String>> {
        let host = match declaration {
            Some(decl) => Some(decl.host.clone()),
            None => self.load()?.get().host.clone(),
        };
        Ok(host
            .as_deref()
            .map(HostRef::parse)
            .and_then(|h| h.machine().map(str::to_string))
            .into_iter()
            .collect())
    }

    /// Address other machines use to reach this container.
    pub fn ssh_name(&self, state: &TrackedState) -> NestboxResult<Option<String>> {
        let Some(address) = state.get().private_address.as_deref() else {
            return Ok(None);
        };
        let host = self.host_of(state)?;
        Ok(Some(self.runner(&host).ssh_name(address)?))
    }

    // ------------------------------------------------------------------
    // helpers shared with config sync
    // ------------------------------------------------------------------

    pub async fn refresh_private_address(
        &self,
        runner: &RemoteCommandRunner<'_>,
        state: &mut TrackedState,
    ) -> NestboxResult<()> {
        let runtime_id = state.get().runtime_id.clone().ok_or_else(|| {
            NestboxError::InvalidState(format!("container '{}' has not been created", self.name))
        })?;
        let address = runner
            .host_output(&runner.commands().show_ip(&runtime_id))
            .await?;
        if address.is_empty() {
            return Err(NestboxError::Internal(format!(
                "runtime reported no address for container '{}'",
                self.name
            )));
        }

        match state.get().private_address.as_deref() {
            Some(previous) if previous != address => {
                tracing::info!(container = %self.name, address = %address, "Changed private address")
            }
            Some(_) => {}
            None => tracing::info!(container = %self.name, address = %address, "Private address"),
        }
        state.set_private_address(Some(address))
    }

    async fn register_host_key(
        &self,
        runner: &RemoteCommandRunner<'_>,
        state: &mut TrackedState,
    ) -> NestboxResult<()> {
        let runtime_id = state.get().runtime_id.clone().ok_or_else(|| {
            NestboxError::InvalidState(format!("container '{}' has not been created", self.name))
        })?;
        let address = state.get().private_address.clone().ok_or_else(|| {
            NestboxError::InvalidState(format!("container '{}' has no private address", self.name))
        })?;

        let key = runner
            .host_output(&runner.commands().show_host_key(&runtime_id))
            .await?;
        let ssh_name = runner.ssh_name(&address)?;
        self.runtime.trust.add(&ssh_name, &key)?;
        tracing::debug!(container = %self.name, name = %ssh_name, "Host key registered");
        state.set_public_host_key(Some(key))
    }

    fn forget_host_key(
        &self,
        runner: &RemoteCommandRunner<'_>,
        state: &TrackedState,
    ) -> NestboxResult<()> {
        if let (Some(address), Some(key)) = (
            state.get().private_address.as_deref(),
            state.get().public_host_key.as_deref(),
        ) {
            self.runtime.trust.remove(&runner.ssh_name(address)?, key)?;
        }
        Ok(())
    }

    /// Drop everything tied to the runtime container. Identity, host and
    /// credential survive so a later create reuses the key.
    fn clear_runtime(&self, state: &mut TrackedState) -> NestboxResult<()> {
        state.set_public_host_key(None)?;
        state.set_private_address(None)?;
        state.set_applied_config(None)?;
        state.set_runtime_id(None)?;
        state.transition_to(ContainerStatus::Missing)
    }

    async fn runtime_status(
        &self,
        runner: &RemoteCommandRunner<'_>,
        runtime_id: &str,
    ) -> NestboxResult<RuntimeStatus> {
        let outcome = runner
            .run_on_host(&runner.commands().status(runtime_id), RunOptions::PROBE)
            .await?;
        Ok(RuntimeStatus::from_output(outcome.output()))
    }

    async fn wait_while_up(
        &self,
        runner: &RemoteCommandRunner<'_>,
        runtime_id: &str,
        timeout: Duration,
        operation: &str,
    ) -> NestboxResult<()> {
        let operation = format!("{} of container '{}'", operation, self.name);
        poll_until(
            self.poll_spec(timeout),
            self.cancel,
            &operation,
            move || async move {
                let status = self.runtime_status(runner, runtime_id).await?;
                Ok::<_, NestboxError>(!status.is_up())
            },
        )
        .await
    }
}
