use std::collections::BTreeMap;

use nestbox_shared::errors::NestboxResult;
use parking_lot::RwLock;

use super::AttributeStore;

/// In-memory [`AttributeStore`] for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttributeStore for MemoryStore {
    fn get(&self, resource: &str, key: &str) -> NestboxResult<Option<String>> {
        Ok(self
            .inner
            .read()
            .get(resource)
            .and_then(|attrs| attrs.get(key).cloned()))
    }

    fn set(&self, resource: &str, key: &str, value: Option<&str>) -> NestboxResult<()> {
        let mut inner = self.inner.write();
        match value {
            Some(value) => {
                inner
                    .entry(resource.to_string())
                    .or_default()
                    .insert(key.to_string(), value.to_string());
            }
            None => {
                if let Some(attrs) = inner.get_mut(resource) {
                    attrs.remove(key);
                    if attrs.is_empty() {
                        inner.remove(resource);
                    }
                }
            }
        }
        Ok(())
    }

    fn attributes(&self, resource: &str) -> NestboxResult<BTreeMap<String, String>> {
        Ok(self.inner.read().get(resource).cloned().unwrap_or_default())
    }

    fn resources(&self) -> NestboxResult<Vec<String>> {
        Ok(self.inner.read().keys().cloned().collect())
    }

    fn remove_all(&self, resource: &str) -> NestboxResult<()> {
        self.inner.write().remove(resource);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleting_last_attribute_drops_resource() {
        let store = MemoryStore::new();
        store.set("web", "status", Some("up")).unwrap();
        assert_eq!(store.resources().unwrap(), vec!["web"]);

        store.set("web", "status", None).unwrap();
        assert!(store.resources().unwrap().is_empty());
    }
}
