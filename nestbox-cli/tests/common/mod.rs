#![allow(dead_code)]

use assert_cmd::Command;
use nestbox::db::{AttributeStore, Database, SqliteStore};
use nestbox::runtime::layout::FilesystemLayout;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Deployment whose runtime command always fails, so nothing real is touched.
const DEPLOYMENT: &str = r#"
options:
  runtime_command: "false"
  poll:
    interval_ms: 10
    stop_timeout_secs: 1
    destroy_timeout_secs: 1
    ready_timeout_secs: 1
containers:
  - name: web
  - name: db
    host: __machine-web
"#;

pub struct TestContext {
    pub cmd: Command,
    pub home: PathBuf,
    pub deployment: PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Command sharing this context's home and deployment.
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_nestbox");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.arg("--home").arg(&self.home);
        cmd.arg("--deployment").arg(&self.deployment);
        cmd.env_remove("NESTBOX_HOME");
        cmd.env_remove("NESTBOX_DEPLOYMENT");
        cmd
    }

    /// Record a container as if an earlier run had created it.
    pub fn seed_container(&self, name: &str, status: &str) {
        let layout = FilesystemLayout::new(self.home.clone());
        layout.prepare().expect("Failed to prepare home");
        let db = Database::open(&layout.db_path()).expect("Failed to open database");
        let store = SqliteStore::new(db);
        for (key, value) in [
            ("status", status),
            ("runtime_id", name),
            ("host", "localhost"),
            ("private_address", "10.233.0.2"),
        ] {
            store.set(name, key, Some(value)).expect("Failed to seed");
        }
    }
}

pub fn nestbox() -> TestContext {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let home = temp_dir.path().join("home");
    let deployment = temp_dir.path().join("deployment.yaml");
    std::fs::write(&deployment, DEPLOYMENT).expect("Failed to write deployment");

    let mut ctx = TestContext {
        cmd: Command::new(env!("CARGO_BIN_EXE_nestbox")),
        home,
        deployment,
        _temp_dir: temp_dir,
    };
    ctx.cmd = ctx.new_cmd();
    ctx
}
