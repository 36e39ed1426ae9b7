//! Attribute store.
//!
//! Container state is persisted one field at a time, keyed by
//! `(resource, key)`, with last-write-wins semantics per field. There is no
//! transaction spanning several fields: a lifecycle operation that fails
//! half-way leaves every field it already wrote in place.

mod attrs;
mod memory;

pub use attrs::SqliteStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use nestbox_shared::errors::{NestboxError, NestboxResult};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

/// Durable get/set of per-resource attributes.
pub trait AttributeStore: Send + Sync {
    fn get(&self, resource: &str, key: &str) -> NestboxResult<Option<String>>;

    /// Write one attribute. `None` deletes it.
    fn set(&self, resource: &str, key: &str, value: Option<&str>) -> NestboxResult<()>;

    /// All attributes of one resource.
    fn attributes(&self, resource: &str) -> NestboxResult<BTreeMap<String, String>>;

    /// Names of every resource that has at least one attribute, sorted.
    fn resources(&self) -> NestboxResult<Vec<String>>;

    fn remove_all(&self, resource: &str) -> NestboxResult<()>;
}

/// Convert rusqlite results into [`NestboxError::Database`].
macro_rules! db_err {
    ($expr:expr) => {
        $expr.map_err(|e| nestbox_shared::errors::NestboxError::Database(e.to_string()))
    };
}
pub(crate) use db_err;

/// Shared SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: &Path) -> NestboxResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NestboxError::Storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let conn = db_err!(Connection::open(path))?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> NestboxResult<Self> {
        let conn = db_err!(Connection::open_in_memory())?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> NestboxResult<Self> {
        db_err!(conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS attrs (
                resource TEXT NOT NULL,
                key      TEXT NOT NULL,
                value    TEXT NOT NULL,
                PRIMARY KEY (resource, key)
            );
            "#
        ))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
