//! Start a container while pushing its credential.
//!
//! `nixos-container start` can block until the container finishes booting,
//! and booting may wait for keys that only arrive over ssh. So the runtime
//! start and the "wait for sshd, then push the key" task run side by side.
//! Either failing drops the other, which kills its in-flight commands.

use std::path::Path;

use nestbox_shared::errors::{NestboxError, NestboxResult};
use tokio_util::sync::CancellationToken;

use super::poll::{PollSpec, poll_until};
use crate::exec::{RemoteCommandRunner, RunOptions};
use crate::runtime::constants::service;
use crate::util::shell_quote;

pub(crate) struct ParallelStart<'a> {
    pub runner: &'a RemoteCommandRunner<'a>,
    pub container: &'a str,
    pub runtime_id: &'a str,
    pub key_file: &'a Path,
    pub public_key: &'a str,
    pub readiness_unit: &'a str,
    pub authorized_keys: &'a str,
    pub ready: PollSpec,
}

impl ParallelStart<'_> {
    /// Run both tasks and return the container's private address, as
    /// read once it became ready.
    pub async fn run(&self, cancel: &CancellationToken) -> NestboxResult<String> {
        let token = cancel.child_token();

        let start = async {
            let result = self.start_runtime(&token).await;
            if result.is_err() {
                token.cancel();
            }
            result
        };
        let push = async {
            let result = self.push_credential(&token).await;
            if result.is_err() {
                token.cancel();
            }
            result
        };

        let ((), address) = tokio::try_join!(start, push)?;
        Ok(address)
    }

    async fn start_runtime(&self, token: &CancellationToken) -> NestboxResult<()> {
        let command = self.runner.commands().start(self.runtime_id);
        tokio::select! {
            _ = token.cancelled() => Err(NestboxError::Cancelled(format!(
                "start of container '{}'",
                self.container
            ))),
            result = self.runner.run_on_host(&command, RunOptions::LOGGED) => {
                result?;
                tracing::debug!(container = %self.container, "Runtime start returned");
                Ok(())
            }
        }
    }

    async fn push_credential(&self, token: &CancellationToken) -> NestboxResult<String> {
        let runner = self.runner;
        let probe = runner
            .commands()
            .unit_property(self.runtime_id, self.readiness_unit, "ActiveState");
        let probe = &probe;
        let operation = format!("{} in container '{}'", self.readiness_unit, self.container);

        tracing::info!(
            container = %self.container,
            unit = %self.readiness_unit,
            "Waiting for unit to become active"
        );
        poll_until(self.ready, token, &operation, move || async move {
            let outcome = runner.run_on_host(probe, RunOptions::PROBE).await?;
            Ok::<_, NestboxError>(outcome.output() == Some(service::ACTIVE))
        })
        .await?;

        let address = runner
            .host_output(&runner.commands().show_ip(self.runtime_id))
            .await?;
        if address.is_empty() {
            return Err(NestboxError::Internal(format!(
                "runtime reported no address for container '{}'",
                self.container
            )));
        }

        let endpoint = runner.container_endpoint(self.runtime_id, &address, self.key_file)?;
        let command = authorize_key_command(self.authorized_keys, self.public_key);
        tokio::select! {
            _ = token.cancelled() => {
                return Err(NestboxError::Cancelled(format!(
                    "credential push to container '{}'",
                    self.container
                )));
            }
            result = runner.run_at(&endpoint, &command, RunOptions::LOGGED) => {
                result?;
            }
        }
        tracing::debug!(container = %self.container, "Client key authorized");
        Ok(address)
    }
}

/// Append `public_key` to `path` unless it is already listed.
pub(crate) fn authorize_key_command(path: &str, public_key: &str) -> String {
    let path_q = shell_quote(path);
    let key_q = shell_quote(public_key.trim());
    let dir_q = shell_quote(
        Path::new(path)
            .parent()
            .map(|p| p.display().to_string())
            .as_deref()
            .unwrap_or("/"),
    );
    format!(
        "mkdir -p -m 700 {dir} && touch {file} && chmod 600 {file} && \
         (grep -qxF {key} {file} || echo {key} >> {file})",
        dir = dir_q,
        file = path_q,
        key = key_q
    )
}
