//! Apply a changed container configuration, restarting only when allowed.

use std::path::Path;

use nestbox_shared::errors::{NestboxError, NestboxResult};

use super::lifecycle::LifecycleController;
use super::state::TrackedState;
use crate::exec::{RemoteCommandRunner, RunOptions};
use crate::runtime::types::ConfigSyncOutcome;

pub(crate) struct ConfigSyncController<'a> {
    lifecycle: &'a LifecycleController<'a>,
}

impl<'a> ConfigSyncController<'a> {
    pub fn new(lifecycle: &'a LifecycleController<'a>) -> Self {
        Self { lifecycle }
    }

    /// Make `config` the active configuration of the container.
    ///
    /// A running container has to be restarted to pick up a new
    /// configuration; without `allow_restart` that fails with
    /// `RestartRequired` and nothing is changed.
    pub async fn reconcile(
        &self,
        runner: &RemoteCommandRunner<'_>,
        state: &mut TrackedState,
        config: &Path,
        allow_restart: bool,
    ) -> NestboxResult<ConfigSyncOutcome> {
        let declared = config.display().to_string();
        if state.get().applied_config.as_deref() == Some(declared.as_str()) {
            tracing::debug!(container = %state.name(), config = %declared, "Configuration unchanged");
            return Ok(ConfigSyncOutcome::Skipped);
        }

        let runtime_id = state.get().runtime_id.clone().ok_or_else(|| {
            NestboxError::InvalidState(format!(
                "container '{}' has not been created",
                state.name()
            ))
        })?;

        let restart = state.status().is_running();
        if restart && !allow_restart {
            return Err(NestboxError::RestartRequired {
                name: state.name().to_string(),
            });
        }

        tracing::info!(container = %state.name(), config = %declared, "Updating container configuration");
        runner.copy_image(config).await?;
        runner
            .run_on_host(
                &runner.commands().install_config(&runtime_id, config),
                RunOptions::LOGGED,
            )
            .await?;
        state.set_applied_config(Some(declared))?;

        if state.get().private_address.is_some() {
            self.lifecycle.refresh_private_address(runner, state).await?;
        }

        if restart {
            self.lifecycle.stop_with(runner, state).await?;
            self.lifecycle.start_with(runner, state).await?;
        }

        Ok(ConfigSyncOutcome::Applied)
    }
}
