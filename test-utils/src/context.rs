use std::sync::Arc;

use nestbox::db::MemoryStore;
use nestbox::trust::MemoryTrustRegistry;
use nestbox::{Collaborators, NestboxOptions, NestboxRuntime, PollOptions};
use tempfile::TempDir;

use crate::{FakeBuilder, FakeHost};

/// Runtime wired to fakes, with an isolated home directory.
pub struct TestRuntime {
    pub runtime: NestboxRuntime,
    pub host: Arc<FakeHost>,
    pub builder: Arc<FakeBuilder>,
    pub store: Arc<MemoryStore>,
    pub trust: Arc<MemoryTrustRegistry>,
    _home: TempDir,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self::with_options(|_| {})
    }

    /// Adjust the options before the runtime is built.
    pub fn with_options(configure: impl FnOnce(&mut NestboxOptions)) -> Self {
        let home = TempDir::new().expect("Failed to create temp dir");
        let mut options = NestboxOptions {
            home_dir: home.path().to_path_buf(),
            poll: PollOptions {
                interval_ms: 10,
                stop_timeout_secs: 5,
                destroy_timeout_secs: 5,
                ready_timeout_secs: 5,
            },
            ..Default::default()
        };
        configure(&mut options);

        let host = Arc::new(FakeHost::with_program(&options.runtime_command));
        let builder = Arc::new(FakeBuilder::new());
        let store = Arc::new(MemoryStore::new());
        let trust = Arc::new(MemoryTrustRegistry::new());

        let runtime = NestboxRuntime::with_collaborators(
            options,
            Collaborators {
                store: store.clone(),
                trust: trust.clone(),
                exec: host.clone(),
                builder: builder.clone(),
            },
        )
        .expect("Failed to create runtime");

        Self {
            runtime,
            host,
            builder,
            store,
            trust,
            _home: home,
        }
    }
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}
