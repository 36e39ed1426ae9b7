//! Resolve host references into endpoints.
//!
//! An indirect reference names another machine. When that machine is itself
//! a managed container, its endpoint is its ssh route through *its* host,
//! so resolution walks the host graph until it reaches a direct endpoint.

use nestbox_shared::errors::{NestboxError, NestboxResult};
use nestbox_shared::transport::Endpoint;

use super::{HostRef, MachineAccess, MachineLookup, ProxyBuilder};
use crate::runtime::constants::MAX_HOST_DEPTH;

pub struct HostResolver<'a> {
    lookup: &'a dyn MachineLookup,
    proxy: &'a ProxyBuilder,
}

impl<'a> HostResolver<'a> {
    pub fn new(lookup: &'a dyn MachineLookup, proxy: &'a ProxyBuilder) -> Self {
        Self { lookup, proxy }
    }

    /// Resolve the host of `container`.
    ///
    /// Results are not cached: a machine may come up or change address
    /// between two calls.
    pub fn resolve(&self, container: &str, host: &str) -> NestboxResult<Endpoint> {
        let mut chain = vec![container.to_string()];
        self.resolve_in(container, host, &mut chain)
    }

    fn resolve_in(
        &self,
        container: &str,
        host: &str,
        chain: &mut Vec<String>,
    ) -> NestboxResult<Endpoint> {
        let name = match HostRef::parse(host) {
            HostRef::Localhost => return Ok(Endpoint::Local),
            HostRef::Address(address) => return Ok(Endpoint::remote(address)),
            HostRef::Machine(name) => name,
        };

        if chain.contains(&name) {
            chain.push(name);
            return Err(NestboxError::HostCycle {
                chain: std::mem::take(chain),
            });
        }
        if chain.len() > MAX_HOST_DEPTH {
            return Err(NestboxError::InvalidState(format!(
                "host chain of container '{}' exceeds {} hops: {}",
                container,
                MAX_HOST_DEPTH,
                chain.join(" -> ")
            )));
        }
        chain.push(name.clone());

        let machine = self.lookup.machine(&name)?;
        if !machine.started {
            return Err(NestboxError::HostUnavailable {
                container: container.to_string(),
                host: machine.name,
            });
        }

        match machine.access {
            MachineAccess::Direct(endpoint) => Ok(endpoint),
            MachineAccess::Unprovisioned => Err(NestboxError::HostUnavailable {
                container: container.to_string(),
                host: machine.name,
            }),
            MachineAccess::Hosted(hosted) => {
                let parent = self.resolve_in(&machine.name, &hosted.host, chain)?;
                let address = hosted.private_address.ok_or_else(|| {
                    NestboxError::InvalidState(format!(
                        "host container '{}' has no private address yet",
                        machine.name
                    ))
                })?;
                tracing::trace!(
                    container,
                    host = %machine.name,
                    via = %parent,
                    "Resolved nested host"
                );
                Ok(self.proxy.container_endpoint(
                    &parent,
                    &hosted.runtime_id,
                    &address,
                    &hosted.key_file,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::RuntimeCommands;
    use crate::host::{HostedAccess, MachineInfo};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Machines(HashMap<String, MachineInfo>);

    impl Machines {
        fn direct(mut self, name: &str, address: &str, started: bool) -> Self {
            self.0.insert(
                name.into(),
                MachineInfo {
                    name: name.into(),
                    started,
                    access: MachineAccess::Direct(Endpoint::remote(address)),
                },
            );
            self
        }

        fn hosted(mut self, name: &str, host: &str, address: &str) -> Self {
            self.0.insert(
                name.into(),
                MachineInfo {
                    name: name.into(),
                    started: true,
                    access: MachineAccess::Hosted(HostedAccess {
                        host: host.into(),
                        runtime_id: name.into(),
                        private_address: Some(address.into()),
                        key_file: PathBuf::from(format!("/keys/id-{}", name)),
                    }),
                },
            );
            self
        }
    }

    impl MachineLookup for Machines {
        fn machine(&self, name: &str) -> NestboxResult<MachineInfo> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| NestboxError::NotFound(format!("machine '{}'", name)))
        }
    }

    fn proxy() -> ProxyBuilder {
        ProxyBuilder::new(
            RuntimeCommands::new("nixos-container"),
            22,
            vec![],
            PathBuf::from("/kh"),
        )
    }

    #[test]
    fn test_localhost_and_literal() {
        let machines = Machines::default();
        let proxy = proxy();
        let resolver = HostResolver::new(&machines, &proxy);

        assert_eq!(resolver.resolve("web", "localhost").unwrap(), Endpoint::Local);
        let literal = resolver.resolve("web", "10.0.0.2").unwrap();
        assert_eq!(literal.address(), Some("10.0.0.2"));
        assert!(literal.flags().is_empty());
    }

    #[test]
    fn test_indirect_requires_started() {
        let machines = Machines::default()
            .direct("up", "10.0.0.2", true)
            .direct("down", "10.0.0.3", false);
        let proxy = proxy();
        let resolver = HostResolver::new(&machines, &proxy);

        assert_eq!(
            resolver.resolve("web", "__machine-up").unwrap().address(),
            Some("10.0.0.2")
        );
        match resolver.resolve("web", "__machine-down") {
            Err(NestboxError::HostUnavailable { container, host }) => {
                assert_eq!(container, "web");
                assert_eq!(host, "down");
            }
            other => panic!("expected HostUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_machine() {
        let machines = Machines::default();
        let proxy = proxy();
        let resolver = HostResolver::new(&machines, &proxy);
        assert!(matches!(
            resolver.resolve("web", "__machine-nope"),
            Err(NestboxError::NotFound(_))
        ));
    }

    #[test]
    fn test_nested_container_host() {
        let machines = Machines::default()
            .direct("hv", "10.0.0.2", true)
            .hosted("mid", "__machine-hv", "10.233.1.5");
        let proxy = proxy();
        let resolver = HostResolver::new(&machines, &proxy);

        let ep = resolver.resolve("leaf", "__machine-mid").unwrap();
        assert_eq!(ep.address(), Some("10.0.0.2~10.233.1.5"));
        assert!(ep.flags().iter().any(|f| f
            == "ProxyCommand=ssh -x -a root@10.0.0.2 nixos-container run mid -- nc localhost 22 2> /dev/null"));
    }

    #[test]
    fn test_cycle_detected() {
        let machines = Machines::default()
            .hosted("a", "__machine-b", "10.233.1.2")
            .hosted("b", "__machine-a", "10.233.1.3");
        let proxy = proxy();
        let resolver = HostResolver::new(&machines, &proxy);

        match resolver.resolve("a", "__machine-b") {
            Err(NestboxError::HostCycle { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected HostCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_capped() {
        let mut machines = Machines::default().direct("m0", "10.0.0.1", true);
        for i in 1..=MAX_HOST_DEPTH + 1 {
            machines = machines.hosted(
                &format!("m{}", i),
                &format!("__machine-m{}", i - 1),
                "10.233.0.1",
            );
        }
        let proxy = proxy();
        let resolver = HostResolver::new(&machines, &proxy);

        let top = format!("__machine-m{}", MAX_HOST_DEPTH + 1);
        assert!(matches!(
            resolver.resolve("leaf", &top),
            Err(NestboxError::InvalidState(_))
        ));
    }
}
