//! In-memory entity collections backed by the local store

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::db::{LocalStore, StorageKey};
use crate::error::Error;
use crate::models::{AuditLog, Cemetery, ChatMessage, Employee, Grave, SystemUser};
use crate::sync::ensure_bootstrap_admin;

/// Current state of every synchronized collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    pub graves: Vec<Grave>,
    pub cemeteries: Vec<Cemetery>,
    pub employees: Vec<Employee>,
    pub users: Vec<SystemUser>,
    /// Newest first
    pub audit_logs: Vec<AuditLog>,
    pub messages: Vec<ChatMessage>,
}

impl Collections {
    /// Load every collection, falling back to empty on missing or
    /// unreadable documents. Administrator #1 is always present.
    pub fn load(store: &dyn LocalStore, admin_password: &str) -> Self {
        let mut collections = Self {
            graves: load_collection(store, StorageKey::Graves),
            cemeteries: load_collection(store, StorageKey::Cemeteries),
            employees: load_collection(store, StorageKey::Employees),
            users: load_collection(store, StorageKey::Users),
            audit_logs: load_collection(store, StorageKey::AuditLogs),
            messages: load_collection(store, StorageKey::Messages),
        };

        if ensure_bootstrap_admin(&mut collections.users, admin_password) {
            collections.persist(store, StorageKey::Users);
        }
        collections
    }

    /// Write one collection to the store.
    ///
    /// Failures lose durability but not the in-memory change, so they are
    /// logged rather than returned.
    pub fn persist(&self, store: &dyn LocalStore, key: StorageKey) {
        let encoded = match key {
            StorageKey::Graves => encode(&self.graves),
            StorageKey::Cemeteries => encode(&self.cemeteries),
            StorageKey::Employees => encode(&self.employees),
            StorageKey::Users => encode(&self.users),
            StorageKey::AuditLogs => encode(&self.audit_logs),
            StorageKey::Messages => encode(&self.messages),
            StorageKey::PendingOperations | StorageKey::DeadLetters => return,
        };

        let saved = encoded.and_then(|value| store.save(key, &value));
        if let Err(error) = saved {
            tracing::warn!("Failed to persist {key}, change kept in memory only: {error}");
        }
    }

    /// Number of records in the collection stored under `key`
    pub fn count(&self, key: StorageKey) -> usize {
        match key {
            StorageKey::Graves => self.graves.len(),
            StorageKey::Cemeteries => self.cemeteries.len(),
            StorageKey::Employees => self.employees.len(),
            StorageKey::Users => self.users.len(),
            StorageKey::AuditLogs => self.audit_logs.len(),
            StorageKey::Messages => self.messages.len(),
            StorageKey::PendingOperations | StorageKey::DeadLetters => 0,
        }
    }
}

fn encode<T: Serialize>(records: &[T]) -> crate::Result<Value> {
    serde_json::to_value(records).map_err(Error::from)
}

fn load_collection<T: DeserializeOwned>(store: &dyn LocalStore, key: StorageKey) -> Vec<T> {
    match store.load(key) {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|error| {
            tracing::warn!("Stored {key} is unreadable, starting empty: {error}");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(error) => {
            tracing::warn!("Failed to load {key}, starting empty: {error}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::BOOTSTRAP_ADMIN_ID;
    use serde_json::json;

    #[test]
    fn test_fresh_store_gets_bootstrap_admin() {
        let store = MemoryStore::new();

        let collections = Collections::load(&store, "admin123");

        assert_eq!(collections.users.len(), 1);
        assert_eq!(collections.users[0].id, BOOTSTRAP_ADMIN_ID);
        assert!(store.load(StorageKey::Users).unwrap().is_some());
    }

    #[test]
    fn test_unreadable_collection_falls_back_to_empty() {
        let store = MemoryStore::new();
        store
            .save(StorageKey::Graves, &json!({"not": "an array"}))
            .unwrap();
        store
            .save(
                StorageKey::Employees,
                &json!([{"id": 4, "nome": "Rui", "cargo": "VIGIA", "matricula": null}]),
            )
            .unwrap();

        let collections = Collections::load(&store, "admin123");

        assert!(collections.graves.is_empty());
        assert_eq!(collections.employees.len(), 1);
        assert_eq!(collections.count(StorageKey::Employees), 1);
    }
}
