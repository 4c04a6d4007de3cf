use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::Storage;

/// In-memory backend for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| ((*key).to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, new_entries: HashMap<String, Value>) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.extend(new_entries);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_clear_round_trip() {
        let storage = MemoryStorage::new();
        storage
            .set(HashMap::from([
                ("a".to_string(), Value::from(1)),
                ("b".to_string(), Value::from("two")),
            ]))
            .await
            .unwrap();

        let found = storage.get(&["a", "b", "missing"]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], Value::from(1));

        storage.clear().await.unwrap();
        assert!(storage.get(&["a"]).await.unwrap().is_empty());
    }
}
