use std::collections::BTreeMap;

use nestbox_shared::errors::NestboxResult;
use rusqlite::{OptionalExtension, params};

use super::{AttributeStore, Database, db_err};

/// [`AttributeStore`] backed by the `attrs` table.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl AttributeStore for SqliteStore {
    fn get(&self, resource: &str, key: &str) -> NestboxResult<Option<String>> {
        let conn = self.db.conn();
        db_err!(
            conn.query_row(
                "SELECT value FROM attrs WHERE resource = ?1 AND key = ?2",
                params![resource, key],
                |row| row.get(0),
            )
            .optional()
        )
    }

    fn set(&self, resource: &str, key: &str, value: Option<&str>) -> NestboxResult<()> {
        let conn = self.db.conn();
        match value {
            Some(value) => db_err!(conn.execute(
                "INSERT INTO attrs (resource, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(resource, key) DO UPDATE SET value = excluded.value",
                params![resource, key, value],
            ))?,
            None => db_err!(conn.execute(
                "DELETE FROM attrs WHERE resource = ?1 AND key = ?2",
                params![resource, key],
            ))?,
        };
        tracing::trace!(resource, key, deleted = value.is_none(), "Stored attribute");
        Ok(())
    }

    fn attributes(&self, resource: &str) -> NestboxResult<BTreeMap<String, String>> {
        let conn = self.db.conn();
        let mut stmt = db_err!(conn.prepare("SELECT key, value FROM attrs WHERE resource = ?1"))?;
        let rows = db_err!(stmt.query_map(params![resource], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        }))?;

        let mut result = BTreeMap::new();
        for row in rows {
            let (key, value) = db_err!(row)?;
            result.insert(key, value);
        }
        Ok(result)
    }

    fn resources(&self) -> NestboxResult<Vec<String>> {
        let conn = self.db.conn();
        let mut stmt =
            db_err!(conn.prepare("SELECT DISTINCT resource FROM attrs ORDER BY resource"))?;
        let rows = db_err!(stmt.query_map([], |row| row.get::<_, String>(0)))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(db_err!(row)?);
        }
        Ok(result)
    }

    fn remove_all(&self, resource: &str) -> NestboxResult<()> {
        let conn = self.db.conn();
        db_err!(conn.execute("DELETE FROM attrs WHERE resource = ?1", params![resource]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> SqliteStore {
        SqliteStore::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_set_and_get() {
        let store = store();
        assert_eq!(store.get("web", "status").unwrap(), None);

        store.set("web", "status", Some("stopped")).unwrap();
        assert_eq!(store.get("web", "status").unwrap().as_deref(), Some("stopped"));
    }

    #[test]
    fn test_last_write_wins() {
        let store = store();
        store.set("web", "status", Some("starting")).unwrap();
        store.set("web", "status", Some("up")).unwrap();
        assert_eq!(store.get("web", "status").unwrap().as_deref(), Some("up"));
    }

    #[test]
    fn test_set_none_deletes() {
        let store = store();
        store.set("web", "runtime_id", Some("web")).unwrap();
        store.set("web", "runtime_id", None).unwrap();
        assert_eq!(store.get("web", "runtime_id").unwrap(), None);
    }

    #[test]
    fn test_resources_and_remove_all() {
        let store = store();
        store.set("db", "status", Some("up")).unwrap();
        store.set("web", "status", Some("up")).unwrap();
        store.set("web", "host", Some("localhost")).unwrap();

        assert_eq!(store.resources().unwrap(), vec!["db", "web"]);
        assert_eq!(store.attributes("web").unwrap().len(), 2);

        store.remove_all("web").unwrap();
        assert_eq!(store.resources().unwrap(), vec!["db"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db").join("nestbox.db");

        SqliteStore::new(Database::open(&path).unwrap())
            .set("web", "private_address", Some("10.233.1.2"))
            .unwrap();

        let reopened = SqliteStore::new(Database::open(&path).unwrap());
        assert_eq!(
            reopened.get("web", "private_address").unwrap().as_deref(),
            Some("10.233.1.2")
        );
    }
}
