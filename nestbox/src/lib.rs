//! Nestbox runtime library.
//!
//! Manages containers that run nested inside a host machine, which may be
//! the local machine, a remote one, or another managed container.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

// Global guard for tracing-appender to keep the writer thread alive
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

pub mod build;
pub mod container;
pub mod credential;
pub mod db;
pub mod exec;
pub mod host;
pub mod runtime;
pub mod trust;
pub mod util;

pub use container::{Container, ContainerStatus};
pub use runtime::{Collaborators, NestboxRuntime};

use nestbox_shared::errors::{NestboxError, NestboxResult};
pub use nestbox_shared::errors;
pub use nestbox_shared::transport::Endpoint;
use runtime::layout::FilesystemLayout;
pub use runtime::options::{
    ContainerDeclaration, CreateOptions, MachineDeclaration, NestboxOptions, PollOptions,
    SshOptions,
};
pub use runtime::types::{
    CheckResult, ConfigSyncOutcome, ContainerInfo, DestroyOutcome, PhysicalSpec,
};

/// Initialize tracing for nestbox using the provided filesystem layout.
///
/// Logs are written to `<layout.home_dir()>/logs/nestbox.log` with daily rotation.
/// Uses the `RUST_LOG` environment variable for filtering (defaults to `info`).
/// Idempotent: subsequent calls return immediately once initialized.
pub fn init_logging_for(layout: &FilesystemLayout) -> NestboxResult<()> {
    let logs_dir = layout.logs_dir();
    std::fs::create_dir_all(&logs_dir).map_err(|e| {
        NestboxError::Storage(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let _ = LOG_GUARD.get_or_init(|| {
        let file_appender = tracing_appender::rolling::daily(
            logs_dir,
            runtime::constants::filenames::LOG_FILE,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        // Fails when the host application already installed a subscriber;
        // that one wins.
        util::register_to_tracing(non_blocking, env_filter);

        guard
    });

    Ok(())
}
