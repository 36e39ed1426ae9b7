//! Host references and their resolution into transport endpoints.

mod proxy;
mod resolver;

pub use proxy::ProxyBuilder;
pub use resolver::HostResolver;

use std::path::PathBuf;

use nestbox_shared::errors::NestboxResult;
use nestbox_shared::transport::Endpoint;

use crate::runtime::constants::host;

/// Parsed form of a container's `host` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostRef {
    /// The machine running nestbox itself.
    Localhost,
    /// Another managed machine, written `__machine-<name>`.
    Machine(String),
    /// A literal ssh destination.
    Address(String),
}

impl HostRef {
    pub fn parse(raw: &str) -> Self {
        if raw == host::LOCALHOST {
            HostRef::Localhost
        } else if let Some(name) = raw.strip_prefix(host::MACHINE_PREFIX) {
            HostRef::Machine(name.to_string())
        } else {
            HostRef::Address(raw.to_string())
        }
    }

    /// Name of the machine this reference points to, if indirect.
    pub fn machine(&self) -> Option<&str> {
        match self {
            HostRef::Machine(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostRef::Localhost => f.write_str(host::LOCALHOST),
            HostRef::Machine(name) => write!(f, "{}{}", host::MACHINE_PREFIX, name),
            HostRef::Address(addr) => f.write_str(addr),
        }
    }
}

/// What the resolver needs to know about a machine named by `__machine-<name>`.
#[derive(Debug, Clone)]
pub struct MachineInfo {
    pub name: String,
    pub started: bool,
    pub access: MachineAccess,
}

#[derive(Debug, Clone)]
pub enum MachineAccess {
    /// Reachable directly at a fixed endpoint.
    Direct(Endpoint),
    /// A managed container, itself reached through its own host.
    Hosted(HostedAccess),
    /// A managed container whose runtime container does not exist yet.
    Unprovisioned,
}

#[derive(Debug, Clone)]
pub struct HostedAccess {
    /// Raw host reference of the container.
    pub host: String,
    pub runtime_id: String,
    pub private_address: Option<String>,
    /// Materialised client private key of the container.
    pub key_file: PathBuf,
}

/// Looks up machines referenced indirectly.
pub trait MachineLookup: Send + Sync {
    /// Fails with `NotFound` for unknown names.
    fn machine(&self, name: &str) -> NestboxResult<MachineInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse() {
        assert_eq!(HostRef::parse("localhost"), HostRef::Localhost);
        assert_eq!(HostRef::parse("__machine-hv"), HostRef::Machine("hv".into()));
        assert_eq!(HostRef::parse("10.0.0.2"), HostRef::Address("10.0.0.2".into()));
        assert_eq!(HostRef::parse("__machine-hv").machine(), Some("hv"));
        assert_eq!(HostRef::parse("example.org").machine(), None);
    }

    proptest! {
        #[test]
        fn prop_display_round_trips(raw in "[a-z0-9_.~-]{1,24}") {
            let parsed = HostRef::parse(&raw);
            prop_assert_eq!(parsed.to_string(), raw.clone());
            prop_assert_eq!(HostRef::parse(&parsed.to_string()), parsed);
        }

        #[test]
        fn prop_machine_prefix_always_indirect(name in "[a-z][a-z0-9-]{0,15}") {
            let parsed = HostRef::parse(&format!("__machine-{}", name));
            prop_assert_eq!(parsed.machine(), Some(name.as_str()));
        }
    }
}
