//! In-memory local store

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::{LocalStore, StorageKey};
use crate::error::{Error, Result};

/// Volatile store used by tests and when no database file can be opened
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<StorageKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<StorageKey, Value>>> {
        self.documents
            .lock()
            .map_err(|_| Error::Database("memory store lock poisoned".to_string()))
    }
}

impl LocalStore for MemoryStore {
    fn load(&self, key: StorageKey) -> Result<Option<Value>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    fn save(&self, key: StorageKey, value: &Value) -> Result<()> {
        self.lock()?.insert(key, value.clone());
        Ok(())
    }
}
