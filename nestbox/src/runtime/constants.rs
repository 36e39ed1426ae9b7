//! Constants for the nestbox runtime
//!
//! Centralized location for hardcoded names and defaults.

// Re-export shared constants
pub use nestbox_shared::constants::{host, runtime, service};

pub mod envs {
    pub const NESTBOX_HOME: &str = "NESTBOX_HOME";
}

/// Executables the default collaborators shell out to
pub mod programs {
    pub const SHELL: &str = "sh";
    pub const SSH: &str = "ssh";
    pub const COPY_CLOSURE: &str = "nix-copy-closure";
    pub const NIX_BUILD: &str = "nix-build";
}

/// Polling defaults
pub mod poll_defaults {
    /// Interval between status queries
    pub const INTERVAL_MS: u64 = 1000;

    /// Upper bound for a stop to be observed
    pub const STOP_TIMEOUT_SECS: u64 = 120;

    /// Upper bound for a destroy to be observed
    pub const DESTROY_TIMEOUT_SECS: u64 = 120;

    /// Upper bound for the readiness unit to become active
    pub const READY_TIMEOUT_SECS: u64 = 300;
}

/// Maximum number of indirect hops when resolving a host chain
pub const MAX_HOST_DEPTH: usize = 16;

/// File naming patterns
pub mod filenames {
    /// Lock file name
    pub const LOCK_FILE: &str = ".lock";

    /// SQLite attribute store
    pub const DB_FILE: &str = "nestbox.db";

    /// Rolling log file prefix
    pub const LOG_FILE: &str = "nestbox.log";

    /// Trust registry consulted by the container channel
    pub const KNOWN_HOSTS: &str = "known_hosts";
}
