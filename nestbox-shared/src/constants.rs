//! Shared constants between the library, the CLI and the test fakes
//!
//! The fakes in `test-utils` parse the commands the library emits, so the
//! command vocabulary lives here.

/// Container runtime command vocabulary
pub mod runtime {
    /// Default runtime executable on the host
    pub const DEFAULT_COMMAND: &str = "nixos-container";

    /// Status reported while the container is running
    pub const STATUS_UP: &str = "up";

    /// Status reported while the container exists but is stopped
    pub const STATUS_DOWN: &str = "down";

    /// Status reported (or assumed) once the container no longer exists
    pub const STATUS_GONE: &str = "gone";

    /// Runtime ids are derived from the name truncated to this many characters
    pub const NAME_PREFIX_LEN: usize = 7;

    /// Directory on the host holding per-container configuration files
    pub const CONFIG_DIR: &str = "/etc/containers";
}

/// Host reference vocabulary
pub mod host {
    /// Host reference meaning "no remote hop"
    pub const LOCALHOST: &str = "localhost";

    /// Prefix marking an indirect reference to another managed machine
    pub const MACHINE_PREFIX: &str = "__machine-";
}

/// In-container service defaults
pub mod service {
    /// Port of the in-container ssh daemon
    pub const SSH_PORT: u16 = 22;

    /// Unit whose activation marks the container ready
    pub const READINESS_UNIT: &str = "sshd.service";

    /// systemd ActiveState value of a ready unit
    pub const ACTIVE: &str = "active";

    /// Where the client public key is appended inside the container
    pub const AUTHORIZED_KEYS: &str = "/root/.ssh/authorized_keys";
}
