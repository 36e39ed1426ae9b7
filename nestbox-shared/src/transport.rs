//! Transport endpoint types for host and container channels.

/// Where a command is dispatched.
///
/// `Local` means no remote hop: commands run in a local shell. `Remote`
/// carries the ssh destination (without the `root@` user part) and the extra
/// flags needed to reach it, which may themselves contain a proxy command.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Endpoint {
    /// Run on the local machine
    Local,

    /// Run over ssh
    Remote { address: String, flags: Vec<String> },
}

impl Endpoint {
    /// Create a remote endpoint with no extra flags.
    pub fn remote(address: impl Into<String>) -> Self {
        Self::Remote {
            address: address.into(),
            flags: Vec::new(),
        }
    }

    /// Create a remote endpoint with flags.
    pub fn remote_with_flags(address: impl Into<String>, flags: Vec<String>) -> Self {
        Self::Remote {
            address: address.into(),
            flags,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Endpoint::Local)
    }

    /// The address part, or `None` for a local endpoint.
    pub fn address(&self) -> Option<&str> {
        match self {
            Endpoint::Local => None,
            Endpoint::Remote { address, .. } => Some(address),
        }
    }

    /// Extra transport flags (empty for a local endpoint).
    pub fn flags(&self) -> &[String] {
        match self {
            Endpoint::Local => &[],
            Endpoint::Remote { flags, .. } => flags,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Local => write!(f, "localhost"),
            Endpoint::Remote { address, .. } => write!(f, "root@{}", address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_has_no_address_or_flags() {
        let ep = Endpoint::Local;
        assert!(ep.is_local());
        assert_eq!(ep.address(), None);
        assert!(ep.flags().is_empty());
        assert_eq!(ep.to_string(), "localhost");
    }

    #[test]
    fn test_remote_display() {
        let ep = Endpoint::remote_with_flags("10.0.0.1", vec!["-p".into(), "2222".into()]);
        assert_eq!(ep.address(), Some("10.0.0.1"));
        assert_eq!(ep.flags(), ["-p", "2222"]);
        assert_eq!(ep.to_string(), "root@10.0.0.1");
    }
}
