use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nestbox::Endpoint;
use nestbox::exec::{ExecOutput, RemoteExec};
use nestbox_shared::constants::{runtime, service};
use nestbox_shared::errors::NestboxResult;
use parking_lot::Mutex;

/// One command seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub endpoint: Endpoint,
    pub command: String,
}

/// Model of one runtime container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub id: String,
    pub system_path: String,
    pub up: bool,
    pub address: String,
    pub host_key: String,
    /// Source path of the last installed configuration file.
    pub config: Option<String>,
    pub authorized_keys: Vec<String>,
    /// Scripts run through the login shell.
    pub commands: Vec<String>,
    /// Readiness probes left before the unit reports active.
    probes_until_active: u32,
}

#[derive(Default)]
struct HostState {
    containers: BTreeMap<String, FakeContainer>,
    calls: Vec<Call>,
    copies: Vec<(Endpoint, PathBuf)>,
    failures: Vec<(String, i32)>,
    blocks: Vec<String>,
    responses: Vec<(String, String)>,
    boot_probes: u32,
    next_index: u32,
}

/// [`RemoteExec`] that simulates `nixos-container` on every host it is
/// asked to talk to.
pub struct FakeHost {
    program: String,
    state: Mutex<HostState>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        Self::with_program(runtime::DEFAULT_COMMAND)
    }

    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
            state: Mutex::new(HostState {
                next_index: 2,
                ..Default::default()
            }),
        }
    }

    /// Commands containing `needle` exit with `code` and have no effect.
    pub fn fail_when(&self, needle: &str, code: i32) {
        self.state.lock().failures.push((needle.to_string(), code));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Commands containing `needle` take effect, then never return.
    pub fn block_when(&self, needle: &str) {
        self.state.lock().blocks.push(needle.to_string());
    }

    /// Login-shell scripts containing `needle` print `stdout`.
    pub fn respond(&self, needle: &str, stdout: &str) {
        self.state
            .lock()
            .responses
            .push((needle.to_string(), stdout.to_string()));
    }

    /// After a start, report the readiness unit as not yet active this many
    /// times.
    pub fn set_boot_probes(&self, probes: u32) {
        self.state.lock().boot_probes = probes;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    /// Number of commands containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.command.contains(needle))
            .count()
    }

    pub fn copies(&self) -> Vec<(Endpoint, PathBuf)> {
        self.state.lock().copies.clone()
    }

    pub fn container(&self, id: &str) -> Option<FakeContainer> {
        self.state.lock().containers.get(id).cloned()
    }

    pub fn container_ids(&self) -> Vec<String> {
        self.state.lock().containers.keys().cloned().collect()
    }

    /// Flip a container's running state behind nestbox's back.
    pub fn set_up(&self, id: &str, up: bool) {
        if let Some(c) = self.state.lock().containers.get_mut(id) {
            c.up = up;
        }
    }

    /// Make a container disappear behind nestbox's back.
    pub fn remove(&self, id: &str) {
        self.state.lock().containers.remove(id);
    }

    fn runtime_prefix(&self) -> String {
        format!("{} ", self.program)
    }
}

fn ok(stdout: impl Into<String>) -> ExecOutput {
    ExecOutput::success(stdout)
}

fn fail(code: i32, stderr: &str) -> ExecOutput {
    ExecOutput::failure(code, stderr)
}

fn unquote(word: &str) -> String {
    let word = word.trim();
    match word.strip_prefix('\'').and_then(|w| w.strip_suffix('\'')) {
        Some(inner) => inner.replace(r"'\''", "'"),
        None => word.to_string(),
    }
}

impl HostState {
    fn apply_runtime(&mut self, args: &str) -> ExecOutput {
        let mut words = args.split_whitespace();
        let sub = words.next().unwrap_or_default();
        let id = words.next().unwrap_or_default().to_string();

        match sub {
            "create" => {
                let system_path = args
                    .split_once("--system-path ")
                    .map(|(_, p)| unquote(p))
                    .unwrap_or_default();
                let mut unique = id.clone();
                let mut n = 1;
                while self.containers.contains_key(&unique) {
                    unique = format!("{}-{}", id, n);
                    n += 1;
                }
                let index = self.next_index;
                self.next_index += 1;
                self.containers.insert(
                    unique.clone(),
                    FakeContainer {
                        id: unique.clone(),
                        system_path,
                        up: false,
                        address: format!("10.233.0.{}", index),
                        host_key: format!("ssh-ed25519 AAAAHOSTKEY{}", index),
                        config: None,
                        authorized_keys: Vec::new(),
                        commands: Vec::new(),
                        probes_until_active: 0,
                    },
                );
                ok(format!("{}\n", unique))
            }
            "status" => match self.containers.get(&id) {
                Some(c) if c.up => ok(format!("{}\n", runtime::STATUS_UP)),
                Some(_) => ok(format!("{}\n", runtime::STATUS_DOWN)),
                None => ok(format!("{}\n", runtime::STATUS_GONE)),
            },
            _ => {
                let boot_probes = self.boot_probes;
                let Some(c) = self.containers.get_mut(&id) else {
                    return fail(1, &format!("/etc/containers/{}.conf: no such file", id));
                };
                match sub {
                    "start" => {
                        c.up = true;
                        c.probes_until_active = boot_probes;
                        ok("")
                    }
                    "stop" => {
                        c.up = false;
                        ok("")
                    }
                    "destroy" => {
                        self.containers.remove(&id);
                        ok("")
                    }
                    "show-ip" => ok(format!("{}\n", c.address)),
                    "show-host-key" => ok(format!("{}\n", c.host_key)),
                    "run" => {
                        let inner = args.split_once(" -- ").map(|(_, i)| i).unwrap_or_default();
                        let responses = self.responses.clone();
                        run_inside(c, inner, &responses)
                    }
                    other => fail(1, &format!("unknown subcommand {}", other)),
                }
            }
        }
    }

    fn install_config(&mut self, command: &str) -> ExecOutput {
        let src = command
            .strip_prefix("cp ")
            .and_then(|rest| rest.split_once(' '))
            .map(|(src, _)| unquote(src))
            .unwrap_or_default();
        let id = command
            .split_once("/etc/containers/")
            .and_then(|(_, rest)| rest.split_once(".conf"))
            .map(|(id, _)| id.to_string())
            .unwrap_or_default();
        if let Some(c) = self.containers.get_mut(&id) {
            c.config = Some(src);
        }
        ok("")
    }

    fn push_key(&mut self, endpoint: &Endpoint, command: &str) -> ExecOutput {
        let address = endpoint.address().unwrap_or_default();
        let address = address.rsplit('~').next().unwrap_or(address);
        let Some(c) = self.containers.values_mut().find(|c| c.address == address) else {
            return fail(255, &format!("ssh: connect to host {}: No route to host", address));
        };
        if !c.up {
            return fail(255, "kex_exchange_identification: Connection closed by remote host");
        }
        let key = command
            .split_once("echo ")
            .and_then(|(_, rest)| rest.split_once(" >> "))
            .map(|(key, _)| unquote(key))
            .unwrap_or_default();
        if !c.authorized_keys.contains(&key) {
            c.authorized_keys.push(key);
        }
        ok("")
    }
}

fn run_inside(c: &mut FakeContainer, inner: &str, responses: &[(String, String)]) -> ExecOutput {
    if !c.up {
        return fail(1, "container is not running");
    }
    if let Some(rest) = inner.strip_prefix("systemctl show --property ActiveState --value ") {
        if rest.trim() != service::READINESS_UNIT {
            return ok("inactive\n");
        }
        if c.probes_until_active > 0 {
            c.probes_until_active -= 1;
            return ok("activating\n");
        }
        return ok(format!("{}\n", service::ACTIVE));
    }
    if let Some(script) = inner.strip_prefix("bash --login -c ") {
        let script = unquote(script);
        let script = script
            .strip_prefix("export HOME=/root; ")
            .unwrap_or(&script)
            .to_string();
        let stdout = responses
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        c.commands.push(script);
        return ok(stdout);
    }
    ok("")
}

#[async_trait]
impl RemoteExec for FakeHost {
    async fn exec(
        &self,
        target: &Endpoint,
        command: &str,
        _capture: bool,
    ) -> NestboxResult<ExecOutput> {
        let (output, block) = {
            let mut state = self.state.lock();
            state.calls.push(Call {
                endpoint: target.clone(),
                command: command.to_string(),
            });

            let failure = state
                .failures
                .iter()
                .find(|(needle, _)| command.contains(needle.as_str()))
                .map(|(_, code)| *code);
            let block = state
                .blocks
                .iter()
                .any(|needle| command.contains(needle.as_str()));

            let output = if let Some(code) = failure {
                fail(code, "injected failure")
            } else if let Some(args) = command.strip_prefix(&self.runtime_prefix()) {
                state.apply_runtime(args)
            } else if command.starts_with("cp ") && command.contains("/etc/containers/") {
                state.install_config(command)
            } else if command.contains("grep -qxF") {
                state.push_key(target, command)
            } else {
                ok("")
            };
            (output, block)
        };

        if block {
            std::future::pending::<()>().await;
        }
        Ok(output)
    }

    async fn copy_path(&self, target: &Endpoint, path: &Path) -> NestboxResult<()> {
        self.state
            .lock()
            .copies
            .push((target.clone(), path.to_path_buf()));
        Ok(())
    }
}
