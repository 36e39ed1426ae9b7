//! Host and container channels of one container.

use std::path::Path;

use nestbox_shared::errors::{NestboxError, NestboxResult};
use nestbox_shared::transport::Endpoint;

use super::{RemoteExec, RuntimeCommands};
use crate::host::{HostResolver, ProxyBuilder};

/// How a command's result is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Return stdout instead of streaming it to the log.
    pub capture: bool,
    /// Fail with `CommandFailed` on non-zero exit. When unset, failure is
    /// reported as [`CommandOutcome::Failed`].
    pub check: bool,
}

impl RunOptions {
    /// Checked, output streamed to the log.
    pub const LOGGED: RunOptions = RunOptions {
        capture: false,
        check: true,
    };

    /// Checked, stdout returned.
    pub const CAPTURED: RunOptions = RunOptions {
        capture: true,
        check: true,
    };

    /// Unchecked, stdout returned.
    pub const PROBE: RunOptions = RunOptions {
        capture: true,
        check: false,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit status zero, with captured stdout (empty when not captured).
    Output(String),
    /// Non-zero exit of an unchecked command.
    Failed,
}

impl CommandOutcome {
    /// Captured stdout with trailing whitespace removed, `None` on failure.
    pub fn output(&self) -> Option<&str> {
        match self {
            CommandOutcome::Output(out) => Some(out.trim_end()),
            CommandOutcome::Failed => None,
        }
    }

    fn into_output(self) -> String {
        match self {
            CommandOutcome::Output(out) => out.trim_end().to_string(),
            CommandOutcome::Failed => String::new(),
        }
    }
}

/// Dispatches commands for one container.
///
/// The host endpoint is resolved again for every command so a host that
/// comes up or moves between calls is picked up.
pub struct RemoteCommandRunner<'a> {
    container: &'a str,
    host: &'a str,
    resolver: HostResolver<'a>,
    exec: &'a dyn RemoteExec,
    commands: &'a RuntimeCommands,
    proxy: &'a ProxyBuilder,
}

impl<'a> RemoteCommandRunner<'a> {
    pub fn new(
        container: &'a str,
        host: &'a str,
        resolver: HostResolver<'a>,
        exec: &'a dyn RemoteExec,
        commands: &'a RuntimeCommands,
        proxy: &'a ProxyBuilder,
    ) -> Self {
        Self {
            container,
            host,
            resolver,
            exec,
            commands,
            proxy,
        }
    }

    pub fn commands(&self) -> &RuntimeCommands {
        self.commands
    }

    pub fn host_endpoint(&self) -> NestboxResult<Endpoint> {
        self.resolver.resolve(self.container, self.host)
    }

    /// Run a command line on the container's host.
    pub async fn run_on_host(
        &self,
        command: &str,
        options: RunOptions,
    ) -> NestboxResult<CommandOutcome> {
        let endpoint = self.host_endpoint()?;
        self.run_at(&endpoint, command, options).await
    }

    /// Checked host command returning trimmed stdout.
    pub async fn host_output(&self, command: &str) -> NestboxResult<String> {
        Ok(self
            .run_on_host(command, RunOptions::CAPTURED)
            .await?
            .into_output())
    }

    /// Stage an image on the host. Containers share the host's store, so
    /// staging to the local host does nothing.
    pub async fn copy_image(&self, path: &Path) -> NestboxResult<()> {
        let endpoint = self.host_endpoint()?;
        if endpoint.is_local() {
            return Ok(());
        }
        self.exec.copy_path(&endpoint, path).await
    }

    /// Run a command in a login shell inside the container, through the
    /// runtime's run primitive on the host.
    pub async fn run_in_container(
        &self,
        runtime_id: &str,
        command: &str,
        options: RunOptions,
    ) -> NestboxResult<CommandOutcome> {
        self.run_on_host(&self.commands.login_shell(runtime_id, command), options)
            .await
    }

    /// ssh endpoint of the container itself.
    pub fn container_endpoint(
        &self,
        runtime_id: &str,
        private_address: &str,
        key_file: &Path,
    ) -> NestboxResult<Endpoint> {
        let host = self.host_endpoint()?;
        Ok(self
            .proxy
            .container_endpoint(&host, runtime_id, private_address, key_file))
    }

    /// Name the container is known by in the trust registry.
    pub fn ssh_name(&self, private_address: &str) -> NestboxResult<String> {
        Ok(self.proxy.ssh_name(&self.host_endpoint()?, private_address))
    }

    /// Run a command on an arbitrary endpoint, typically one returned by
    /// [`container_endpoint`](Self::container_endpoint).
    pub async fn run_at(
        &self,
        endpoint: &Endpoint,
        command: &str,
        options: RunOptions,
    ) -> NestboxResult<CommandOutcome> {
        let output = self.exec.exec(endpoint, command, options.capture).await?;
        if output.is_success() {
            return Ok(CommandOutcome::Output(output.stdout));
        }
        if options.check {
            return Err(NestboxError::command_failed(
                command,
                output.code,
                &output.stderr,
            ));
        }
        tracing::debug!(
            container = %self.container,
            command,
            code = ?output.code,
            "Command failed"
        );
        Ok(CommandOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecOutput;
    use crate::host::{MachineInfo, MachineLookup};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    struct NoMachines;

    impl MachineLookup for NoMachines {
        fn machine(&self, name: &str) -> NestboxResult<MachineInfo> {
            Err(NestboxError::NotFound(name.to_string()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Endpoint, String)>>,
        copies: Mutex<Vec<PathBuf>>,
        exit: i32,
    }

    #[async_trait]
    impl RemoteExec for Recorder {
        async fn exec(
            &self,
            target: &Endpoint,
            command: &str,
            _capture: bool,
        ) -> NestboxResult<ExecOutput> {
            self.calls.lock().push((target.clone(), command.to_string()));
            if self.exit == 0 {
                Ok(ExecOutput::success("out\n"))
            } else {
                Ok(ExecOutput::failure(self.exit, "bad\n"))
            }
        }

        async fn copy_path(&self, _target: &Endpoint, path: &Path) -> NestboxResult<()> {
            self.copies.lock().push(path.to_path_buf());
            Ok(())
        }
    }

    fn parts() -> (RuntimeCommands, ProxyBuilder) {
        let commands = RuntimeCommands::new("nixos-container");
        let proxy = ProxyBuilder::new(commands.clone(), 22, vec![], PathBuf::from("/kh"));
        (commands, proxy)
    }

    #[tokio::test]
    async fn test_login_shell_runs_on_host() {
        let (commands, proxy) = parts();
        let exec = Recorder::default();
        let runner = RemoteCommandRunner::new(
            "web",
            "10.0.0.2",
            HostResolver::new(&NoMachines, &proxy),
            &exec,
            &commands,
            &proxy,
        );

        let out = runner
            .run_in_container("web", "uptime", RunOptions::CAPTURED)
            .await
            .unwrap();
        assert_eq!(out.output(), Some("out"));

        let calls = exec.calls.lock();
        assert_eq!(calls[0].0, Endpoint::remote("10.0.0.2"));
        assert_eq!(
            calls[0].1,
            "nixos-container run web -- bash --login -c 'export HOME=/root; uptime'"
        );
    }

    #[tokio::test]
    async fn test_check_and_sentinel() {
        let (commands, proxy) = parts();
        let exec = Recorder {
            exit: 2,
            ..Default::default()
        };
        let runner = RemoteCommandRunner::new(
            "web",
            "localhost",
            HostResolver::new(&NoMachines, &proxy),
            &exec,
            &commands,
            &proxy,
        );

        let err = runner
            .run_on_host("false", RunOptions::LOGGED)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "command 'false' failed with exit status 2: bad"
        );

        let outcome = runner.run_on_host("false", RunOptions::PROBE).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Failed);
        assert_eq!(outcome.output(), None);
    }

    #[tokio::test]
    async fn test_copy_image_skips_local_host() {
        let (commands, proxy) = parts();
        let exec = Recorder::default();

        let local = RemoteCommandRunner::new(
            "web",
            "localhost",
            HostResolver::new(&NoMachines, &proxy),
            &exec,
            &commands,
            &proxy,
        );
        local.copy_image(Path::new("/nix/store/a")).await.unwrap();
        assert!(exec.copies.lock().is_empty());

        let remote = RemoteCommandRunner::new(
            "web",
            "hv",
            HostResolver::new(&NoMachines, &proxy),
            &exec,
            &commands,
            &proxy,
        );
        remote.copy_image(Path::new("/nix/store/a")).await.unwrap();
        assert_eq!(exec.copies.lock().len(), 1);
    }
}
