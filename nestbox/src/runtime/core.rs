//! Runtime: home directory, store, collaborators and the machine registry.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use nestbox_shared::errors::{NestboxError, NestboxResult};
use nestbox_shared::transport::Endpoint;
use parking_lot::RwLock;

use crate::build::{ImageBuilder, NixBuilder};
use crate::container::{Container, ContainerState};
use crate::credential;
use crate::db::{AttributeStore, Database, SqliteStore};
use crate::exec::{ProcessExec, RemoteExec, RuntimeCommands};
use crate::host::{HostedAccess, MachineAccess, MachineInfo, MachineLookup, ProxyBuilder};
use crate::init_logging_for;
use crate::runtime::layout::FilesystemLayout;
use crate::runtime::lock::RuntimeLock;
use crate::runtime::options::{MachineDeclaration, NestboxOptions};
use crate::runtime::types::ContainerInfo;
use crate::trust::{KnownHostsFile, TrustRegistry};

/// External capabilities the runtime drives.
///
/// [`NestboxRuntime::new`] wires the real ones; tests substitute fakes
/// through [`NestboxRuntime::with_collaborators`].
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn AttributeStore>,
    pub trust: Arc<dyn TrustRegistry>,
    pub exec: Arc<dyn RemoteExec>,
    pub builder: Arc<dyn ImageBuilder>,
}

/// Entry point for managing containers.
///
/// Only one runtime can use a given home directory at a time; the lock is
/// released when the last clone is dropped. Cloning is cheap.
#[derive(Clone)]
pub struct NestboxRuntime {
    inner: RuntimeInner,
}

pub type RuntimeInner = Arc<RuntimeInnerImpl>;

pub struct RuntimeInnerImpl {
    pub(crate) options: NestboxOptions,
    pub(crate) layout: FilesystemLayout,
    pub(crate) store: Arc<dyn AttributeStore>,
    pub(crate) trust: Arc<dyn TrustRegistry>,
    pub(crate) exec: Arc<dyn RemoteExec>,
    pub(crate) builder: Arc<dyn ImageBuilder>,
    pub(crate) commands: RuntimeCommands,
    pub(crate) proxy: ProxyBuilder,
    /// Machines managed outside nestbox, by name.
    machines: RwLock<BTreeMap<String, MachineDeclaration>>,
    _runtime_lock: RuntimeLock,
}

impl NestboxRuntime {
    /// Create a runtime with the default collaborators: SQLite store,
    /// known_hosts file, local processes and `nix-build`.
    ///
    /// # Errors
    ///
    /// - invalid options
    /// - another runtime holds the home directory
    /// - the home directory or database cannot be initialized
    pub fn new(options: NestboxOptions) -> NestboxResult<Self> {
        options.sanitize()?;
        let layout = FilesystemLayout::new(options.home_dir.clone());
        layout.prepare()?;
        init_logging_for(&layout)?;

        let lock = RuntimeLock::acquire(layout.home_dir())?;
        let db = Database::open(&layout.db_path())?;

        let collaborators = Collaborators {
            store: Arc::new(SqliteStore::new(db)),
            trust: Arc::new(KnownHostsFile::new(layout.known_hosts())),
            exec: Arc::new(ProcessExec::new()),
            builder: Arc::new(NixBuilder::new(layout.temp_dir())),
        };
        Ok(Self::assemble(options, layout, lock, collaborators))
    }

    /// Create a runtime around caller-provided collaborators.
    pub fn with_collaborators(
        options: NestboxOptions,
        collaborators: Collaborators,
    ) -> NestboxResult<Self> {
        options.sanitize()?;
        let layout = FilesystemLayout::new(options.home_dir.clone());
        layout.prepare()?;
        let lock = RuntimeLock::acquire(layout.home_dir())?;
        Ok(Self::assemble(options, layout, lock, collaborators))
    }

    fn assemble(
        options: NestboxOptions,
        layout: FilesystemLayout,
        lock: RuntimeLock,
        collaborators: Collaborators,
    ) -> Self {
        let commands = RuntimeCommands::new(options.runtime_command.clone());
        let proxy = ProxyBuilder::new(
            commands.clone(),
            options.ssh.port,
            options.ssh.extra_flags.clone(),
            layout.known_hosts(),
        );

        let inner = Arc::new(RuntimeInnerImpl {
            options,
            layout,
            store: collaborators.store,
            trust: collaborators.trust,
            exec: collaborators.exec,
            builder: collaborators.builder,
            commands,
            proxy,
            machines: RwLock::new(BTreeMap::new()),
            _runtime_lock: lock,
        });

        tracing::debug!(home = %inner.layout.home_dir().display(), "Initialized runtime");
        Self { inner }
    }

    pub fn options(&self) -> &NestboxOptions {
        &self.inner.options
    }

    pub fn home_dir(&self) -> &Path {
        self.inner.layout.home_dir()
    }

    /// Make a machine available as `__machine-<name>`. Re-registering a
    /// name replaces the previous entry.
    pub fn register_machine(&self, machine: MachineDeclaration) -> NestboxResult<()> {
        if machine.name.is_empty() {
            return Err(NestboxError::Config("machine name is empty".into()));
        }
        if machine.address.trim().is_empty() {
            return Err(NestboxError::Config(format!(
                "machine '{}' has an empty address",
                machine.name
            )));
        }
        tracing::debug!(machine = %machine.name, started = machine.started, "Registered machine");
        self.inner
            .machines
            .write()
            .insert(machine.name.clone(), machine);
        Ok(())
    }

    /// Handle to a container. The container need not exist yet.
    pub fn container(&self, name: &str) -> Container {
        Container::new(name.to_string(), Arc::clone(&self.inner))
    }

    /// Every container with stored state, sorted by name.
    pub fn list(&self) -> NestboxResult<Vec<ContainerInfo>> {
        self.inner
            .store
            .resources()?
            .iter()
            .map(|name| Ok(ContainerState::load(self.inner.store.as_ref(), name)?.into()))
            .collect()
    }

    pub fn get(&self, name: &str) -> NestboxResult<Option<ContainerInfo>> {
        if self.inner.store.attributes(name)?.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            ContainerState::load(self.inner.store.as_ref(), name)?.into(),
        ))
    }
}

impl MachineLookup for RuntimeInnerImpl {
    fn machine(&self, name: &str) -> NestboxResult<MachineInfo> {
        if let Some(machine) = self.machines.read().get(name) {
            return Ok(MachineInfo {
                name: machine.name.clone(),
                started: machine.started,
                access: MachineAccess::Direct(Endpoint::remote_with_flags(
                    machine.address.clone(),
                    machine.flags.clone(),
                )),
            });
        }

        let state = ContainerState::load(self.store.as_ref(), name)?;
        let (Some(runtime_id), Some(host)) = (state.runtime_id, state.host) else {
            if state.client_public_key.is_some() {
                // Declared and keyed, but its runtime container does not exist.
                return Ok(MachineInfo {
                    name: name.to_string(),
                    started: false,
                    access: MachineAccess::Unprovisioned,
                });
            }
            return Err(NestboxError::NotFound(format!("machine '{}'", name)));
        };

        let key_file = self.layout.key_file(name);
        if let Some(private_key) = state.client_private_key.as_deref() {
            credential::write_private_key(&key_file, private_key)?;
        }

        Ok(MachineInfo {
            name: name.to_string(),
            started: state.status.is_running(),
            access: MachineAccess::Hosted(HostedAccess {
                host,
                runtime_id,
                private_address: state.private_address,
                key_file,
            }),
        })
    }
}

impl std::fmt::Debug for NestboxRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestboxRuntime")
            .field("home_dir", &self.inner.layout.home_dir())
            .finish()
    }
}

impl std::fmt::Debug for RuntimeInnerImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeInner")
            .field("home_dir", &self.layout.home_dir())
            .finish()
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<NestboxRuntime>;
};
