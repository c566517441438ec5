//! In-memory State Store used by tests and local runs without Postgres.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{StateKey, StateStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(String, StateKey), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, user_id: &str, key: StateKey) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().expect("state lock poisoned");
        Ok(entries.get(&(user_id.to_string(), key)).cloned())
    }

    async fn set(&self, user_id: &str, key: StateKey, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().expect("state lock poisoned");
        entries.insert((user_id.to_string(), key), value);
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().expect("state lock poisoned");
        entries.retain(|(uid, _), _| uid != user_id);
        Ok(())
    }
}
