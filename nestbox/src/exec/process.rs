//! [`RemoteExec`] over local processes: `sh -c` for the local host, `ssh` for
//! everything else, `nix-copy-closure` for staging.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use nestbox_shared::errors::{NestboxError, NestboxResult};
use nestbox_shared::transport::Endpoint;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::{ExecOutput, RemoteExec};
use crate::runtime::constants::programs;
use crate::util::shell_join;

#[derive(Debug, Clone, Default)]
pub struct ProcessExec;

impl ProcessExec {
    pub fn new() -> Self {
        Self
    }

    fn command_for(target: &Endpoint, command: &str) -> Command {
        match target {
            Endpoint::Local => {
                let mut cmd = Command::new(programs::SHELL);
                cmd.arg("-c").arg(command);
                cmd
            }
            Endpoint::Remote { address, flags } => {
                let mut cmd = Command::new(programs::SSH);
                cmd.arg("-x")
                    .args(flags)
                    .arg(format!("root@{}", address))
                    .arg(command);
                cmd
            }
        }
    }
}

#[async_trait]
impl RemoteExec for ProcessExec {
    async fn exec(
        &self,
        target: &Endpoint,
        command: &str,
        capture: bool,
    ) -> NestboxResult<ExecOutput> {
        tracing::debug!(endpoint = %target, command, "Running command");
        run(Self::command_for(target, command), command, capture).await
    }

    async fn copy_path(&self, target: &Endpoint, path: &Path) -> NestboxResult<()> {
        let Endpoint::Remote { address, flags } = target else {
            return Ok(());
        };

        tracing::info!(endpoint = %target, path = %path.display(), "Copying closure");
        let mut cmd = Command::new(programs::COPY_CLOSURE);
        cmd.arg("--to")
            .arg(format!("root@{}", address))
            .arg(path)
            .env("NIX_SSHOPTS", shell_join(flags));

        let display = format!("{} --to root@{} {}", programs::COPY_CLOSURE, address, path.display());
        let output = run(cmd, &display, false).await?;
        if !output.is_success() {
            return Err(NestboxError::command_failed(display, output.code, &output.stderr));
        }
        Ok(())
    }
}

/// Spawn `cmd`, drain both pipes and wait for exit.
///
/// The child is killed if this future is dropped, which is how a cancelled
/// start tears down its in-flight commands.
async fn run(mut cmd: Command, display: &str, capture: bool) -> NestboxResult<ExecOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| NestboxError::Internal(format!("failed to spawn '{}': {}", display, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| NestboxError::Internal("child stdout not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| NestboxError::Internal("child stderr not captured".into()))?;

    let (stdout, stderr, status) = tokio::join!(
        drain(stdout, capture, "stdout"),
        drain(stderr, true, "stderr"),
        child.wait()
    );

    let status = status
        .map_err(|e| NestboxError::Internal(format!("failed to wait for '{}': {}", display, e)))?;

    Ok(ExecOutput {
        code: status.code(),
        stdout: stdout?,
        stderr: stderr?,
    })
}

/// Read a pipe line by line. Lines are always logged; they are only kept
/// when `keep` is set.
async fn drain<R>(reader: R, keep: bool, stream: &'static str) -> NestboxResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut buf = String::new();
    while let Some(line) = lines.next_line().await? {
        tracing::debug!(stream, "{}", line);
        if keep {
            buf.push_str(&line);
            buf.push('\n');
        }
    }
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_capture() {
        let exec = ProcessExec::new();
        let out = exec
            .exec(&Endpoint::Local, "echo hello; echo oops >&2", true)
            .await
            .unwrap();
        assert!(out.is_success());
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_local_without_capture_drops_stdout() {
        let exec = ProcessExec::new();
        let out = exec.exec(&Endpoint::Local, "echo hello", false).await.unwrap();
        assert!(out.is_success());
        assert!(out.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let exec = ProcessExec::new();
        let out = exec.exec(&Endpoint::Local, "exit 3", true).await.unwrap();
        assert_eq!(out.code, Some(3));
        assert!(!out.is_success());
    }

    #[tokio::test]
    async fn test_copy_to_local_is_noop() {
        let exec = ProcessExec::new();
        exec.copy_path(&Endpoint::Local, Path::new("/nix/store/does-not-exist"))
            .await
            .unwrap();
    }

    #[test]
    fn test_remote_command_line() {
        let target = Endpoint::remote_with_flags("10.0.0.2", vec!["-p".into(), "2222".into()]);
        let cmd = ProcessExec::command_for(&target, "uptime");
        let std = cmd.as_std();
        assert_eq!(std.get_program(), "ssh");
        let args: Vec<_> = std.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-x", "-p", "2222", "root@10.0.0.2", "uptime"]);
    }
}
