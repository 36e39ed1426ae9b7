use std::path::{Path, PathBuf};

use nestbox_shared::transport::Endpoint;

use crate::exec::RuntimeCommands;
use crate::util::shell_join;

/// Builds the ssh route into a container through its host.
///
/// The container's sshd is reached by running `nc` inside the container's
/// namespaces on the host, so network setup inside the container is not
/// required.
#[derive(Debug, Clone)]
pub struct ProxyBuilder {
    commands: RuntimeCommands,
    port: u16,
    extra_flags: Vec<String>,
    known_hosts: PathBuf,
}

impl ProxyBuilder {
    pub fn new(
        commands: RuntimeCommands,
        port: u16,
        extra_flags: Vec<String>,
        known_hosts: PathBuf,
    ) -> Self {
        Self {
            commands,
            port,
            extra_flags,
            known_hosts,
        }
    }

    /// Proxy command tunnelling stdin/stdout to the container's ssh port.
    pub fn build(&self, host: &Endpoint, runtime_id: &str) -> String {
        let tunnel = format!(
            "{} 2> /dev/null",
            self.commands
                .run(runtime_id, &format!("nc localhost {}", self.port))
        );
        match host {
            Endpoint::Local => tunnel,
            Endpoint::Remote { address, flags } if flags.is_empty() => {
                format!("ssh -x -a root@{} {}", address, tunnel)
            }
            Endpoint::Remote { address, flags } => {
                format!("ssh -x -a root@{} {} {}", address, shell_join(flags), tunnel)
            }
        }
    }

    /// Name ssh uses for the container: the private address on the local
    /// host, `<host>~<address>` otherwise. Also the trust registry key.
    pub fn ssh_name(&self, host: &Endpoint, private_address: &str) -> String {
        match host {
            Endpoint::Local => private_address.to_string(),
            Endpoint::Remote { address, .. } => format!("{}~{}", address, private_address),
        }
    }

    /// Full ssh endpoint of a container.
    pub fn container_endpoint(
        &self,
        host: &Endpoint,
        runtime_id: &str,
        private_address: &str,
        key_file: &Path,
    ) -> Endpoint {
        let mut flags = vec![
            "-i".to_string(),
            key_file.display().to_string(),
            "-o".to_string(),
            format!("ProxyCommand={}", self.build(host, runtime_id)),
        ];
        flags.extend(self.extra_flags.iter().cloned());
        flags.push("-o".to_string());
        flags.push(format!("UserKnownHostsFile={}", self.known_hosts.display()));

        Endpoint::remote_with_flags(self.ssh_name(host, private_address), flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ProxyBuilder {
        ProxyBuilder::new(
            RuntimeCommands::new("nixos-container"),
            22,
            vec![],
            PathBuf::from("/home/u/.nestbox/known_hosts"),
        )
    }

    #[test]
    fn test_local_host_has_no_ssh_hop() {
        assert_eq!(
            builder().build(&Endpoint::Local, "web"),
            "nixos-container run web -- nc localhost 22 2> /dev/null"
        );
    }

    #[test]
    fn test_remote_host_without_flags() {
        assert_eq!(
            builder().build(&Endpoint::remote("10.0.0.2"), "web"),
            "ssh -x -a root@10.0.0.2 nixos-container run web -- nc localhost 22 2> /dev/null"
        );
    }

    #[test]
    fn test_remote_host_flags_are_quoted() {
        let host = Endpoint::remote_with_flags(
            "10.0.0.2~10.233.1.5",
            vec!["-o".into(), "ProxyCommand=ssh -x -a root@10.0.0.2 nc".into()],
        );
        assert_eq!(
            builder().build(&host, "db"),
            "ssh -x -a root@10.0.0.2~10.233.1.5 -o 'ProxyCommand=ssh -x -a root@10.0.0.2 nc' \
             nixos-container run db -- nc localhost 22 2> /dev/null"
        );
    }

    #[test]
    fn test_ssh_name() {
        let b = builder();
        assert_eq!(b.ssh_name(&Endpoint::Local, "10.233.1.2"), "10.233.1.2");
        assert_eq!(
            b.ssh_name(&Endpoint::remote("hv"), "10.233.1.2"),
            "hv~10.233.1.2"
        );
    }

    #[test]
    fn test_container_endpoint_flags() {
        let ep = builder().container_endpoint(
            &Endpoint::Local,
            "web",
            "10.233.1.2",
            Path::new("/keys/id-web"),
        );
        assert_eq!(ep.address(), Some("10.233.1.2"));
        assert_eq!(
            ep.flags(),
            &[
                "-i".to_string(),
                "/keys/id-web".to_string(),
                "-o".to_string(),
                "ProxyCommand=nixos-container run web -- nc localhost 22 2> /dev/null".to_string(),
                "-o".to_string(),
                "UserKnownHostsFile=/home/u/.nestbox/known_hosts".to_string(),
            ]
        );
    }
}
