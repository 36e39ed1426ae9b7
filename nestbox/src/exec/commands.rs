//! Command lines of the container runtime, run on the host channel.

use std::path::Path;

use crate::runtime::constants::runtime;

/// Single-quote `text` for embedding in a `'...'` shell string.
fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', r"'\''")
}

/// Formats `nixos-container` invocations.
#[derive(Debug, Clone)]
pub struct RuntimeCommands {
    program: String,
}

impl RuntimeCommands {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Create a container from a system image. The runtime may pick a
    /// different id than `name` and prints the one it used.
    pub fn create(&self, name: &str, system_path: &Path) -> String {
        let short: String = name.chars().take(runtime::NAME_PREFIX_LEN).collect();
        format!(
            "{} create {} --ensure-unique-name --system-path '{}'",
            self.program,
            short,
            escape_single_quotes(&system_path.display().to_string())
        )
    }

    pub fn start(&self, id: &str) -> String {
        format!("{} start {}", self.program, id)
    }

    pub fn stop(&self, id: &str) -> String {
        format!("{} stop {}", self.program, id)
    }

    pub fn destroy(&self, id: &str) -> String {
        format!("{} destroy {}", self.program, id)
    }

    pub fn status(&self, id: &str) -> String {
        format!("{} status {}", self.program, id)
    }

    pub fn show_ip(&self, id: &str) -> String {
        format!("{} show-ip {}", self.program, id)
    }

    pub fn show_host_key(&self, id: &str) -> String {
        format!("{} show-host-key {}", self.program, id)
    }

    /// Run `command` inside the container's namespaces.
    pub fn run(&self, id: &str, command: &str) -> String {
        format!("{} run {} -- {}", self.program, id, command)
    }

    /// Run `command` in a root login shell inside the container.
    pub fn login_shell(&self, id: &str, command: &str) -> String {
        self.run(
            id,
            &format!(
                "bash --login -c 'export HOME=/root; {}'",
                escape_single_quotes(command)
            ),
        )
    }

    /// Query one property of a systemd unit inside the container.
    pub fn unit_property(&self, id: &str, unit: &str, property: &str) -> String {
        self.run(
            id,
            &format!("systemctl show --property {} --value {}", property, unit),
        )
    }

    /// Replace the active configuration of a container with `config`.
    ///
    /// The file is written next to its destination and renamed over it.
    pub fn install_config(&self, id: &str, config: &Path) -> String {
        let target = format!("{}/{}.conf", runtime::CONFIG_DIR, id);
        format!(
            "cp '{src}' {target}.tmp && mv -f {target}.tmp {target}",
            src = escape_single_quotes(&config.display().to_string()),
            target = target
        )
    }
}

/// Status reported by the runtime's `status` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    Up,
    Down,
    Gone,
    /// Anything else the runtime printed.
    Unknown(String),
}

impl RuntimeStatus {
    /// Parse captured output. A failed status query means the runtime no
    /// longer knows the container, so `None` maps to [`RuntimeStatus::Gone`].
    pub fn from_output(output: Option<&str>) -> Self {
        match output.map(str::trim) {
            None => RuntimeStatus::Gone,
            Some(runtime::STATUS_UP) => RuntimeStatus::Up,
            Some(runtime::STATUS_DOWN) => RuntimeStatus::Down,
            Some(runtime::STATUS_GONE) => RuntimeStatus::Gone,
            Some(other) => RuntimeStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, RuntimeStatus::Up)
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeStatus::Up => f.write_str(runtime::STATUS_UP),
            RuntimeStatus::Down => f.write_str(runtime::STATUS_DOWN),
            RuntimeStatus::Gone => f.write_str(runtime::STATUS_GONE),
            RuntimeStatus::Unknown(s) => write!(f, "unknown ({})", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands() -> RuntimeCommands {
        RuntimeCommands::new("nixos-container")
    }

    #[test]
    fn test_create_truncates_name() {
        let cmd = commands().create("webserver", Path::new("/nix/store/abc-nixos-system"));
        assert_eq!(
            cmd,
            "nixos-container create webserv --ensure-unique-name --system-path '/nix/store/abc-nixos-system'"
        );
    }

    #[test]
    fn test_login_shell_escapes_quotes() {
        let cmd = commands().login_shell("web", "echo 'hi'");
        assert_eq!(
            cmd,
            r"nixos-container run web -- bash --login -c 'export HOME=/root; echo '\''hi'\'''"
        );
    }

    #[test]
    fn test_unit_property() {
        assert_eq!(
            commands().unit_property("web", "sshd.service", "ActiveState"),
            "nixos-container run web -- systemctl show --property ActiveState --value sshd.service"
        );
    }

    #[test]
    fn test_install_config_renames() {
        assert_eq!(
            commands().install_config("web", Path::new("/nix/store/xyz-web.conf")),
            "cp '/nix/store/xyz-web.conf' /etc/containers/web.conf.tmp && mv -f /etc/containers/web.conf.tmp /etc/containers/web.conf"
        );
    }

    #[test]
    fn test_custom_program() {
        let cmds = RuntimeCommands::new("/run/current-system/sw/bin/nixos-container");
        assert_eq!(cmds.start("web"), "/run/current-system/sw/bin/nixos-container start web");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(RuntimeStatus::from_output(Some("up\n")), RuntimeStatus::Up);
        assert_eq!(RuntimeStatus::from_output(Some("down")), RuntimeStatus::Down);
        assert_eq!(RuntimeStatus::from_output(Some("gone")), RuntimeStatus::Gone);
        assert_eq!(RuntimeStatus::from_output(None), RuntimeStatus::Gone);
        assert_eq!(
            RuntimeStatus::from_output(Some("starting")),
            RuntimeStatus::Unknown("starting".into())
        );
    }
}
