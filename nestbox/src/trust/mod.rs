//! Trust registry for container host keys.
//!
//! Entries are keyed by the ssh name of a container (its private address, or
//! `<host>~<address>` when the host is remote), which is the name ssh matches
//! against when it connects through the proxy command.

mod known_hosts;

pub use known_hosts::KnownHostsFile;

use std::collections::BTreeSet;

use nestbox_shared::errors::NestboxResult;
use parking_lot::Mutex;

pub trait TrustRegistry: Send + Sync {
    fn add(&self, name: &str, public_host_key: &str) -> NestboxResult<()>;

    /// Remove an entry. Removing an absent entry is not an error.
    fn remove(&self, name: &str, public_host_key: &str) -> NestboxResult<()>;
}

/// In-memory registry for tests.
#[derive(Debug, Default)]
pub struct MemoryTrustRegistry {
    entries: Mutex<BTreeSet<(String, String)>>,
}

impl MemoryTrustRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str, public_host_key: &str) -> bool {
        self.entries
            .lock()
            .contains(&(name.to_string(), public_host_key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TrustRegistry for MemoryTrustRegistry {
    fn add(&self, name: &str, public_host_key: &str) -> NestboxResult<()> {
        self.entries
            .lock()
            .insert((name.to_string(), public_host_key.trim().to_string()));
        Ok(())
    }

    fn remove(&self, name: &str, public_host_key: &str) -> NestboxResult<()> {
        self.entries
            .lock()
            .remove(&(name.to_string(), public_host_key.trim().to_string()));
        Ok(())
    }
}
