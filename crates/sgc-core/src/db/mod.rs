//! Durable local store for SGC
//!
//! Collections and the pending-operations queue are persisted as JSON
//! documents under a fixed set of keys.

mod connection;
mod memory;
mod migrations;

use std::fmt;

use serde_json::Value;

use crate::error::Result;

pub use connection::SqliteStore;
pub use memory::MemoryStore;

/// Keys under which the local store persists documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    Graves,
    Cemeteries,
    Employees,
    Users,
    AuditLogs,
    Messages,
    PendingOperations,
    DeadLetters,
}

impl StorageKey {
    pub const ALL: [Self; 8] = [
        Self::Graves,
        Self::Cemeteries,
        Self::Employees,
        Self::Users,
        Self::AuditLogs,
        Self::Messages,
        Self::PendingOperations,
        Self::DeadLetters,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Graves => "graves",
            Self::Cemeteries => "cemeteries",
            Self::Employees => "employees",
            Self::Users => "users",
            Self::AuditLogs => "audit_logs",
            Self::Messages => "messages",
            Self::PendingOperations => "pending_operations",
            Self::DeadLetters => "dead_letters",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value persistence for JSON documents
pub trait LocalStore: Send + Sync {
    /// Load the document stored under `key`, if any
    fn load(&self, key: StorageKey) -> Result<Option<Value>>;

    /// Replace the document stored under `key`
    fn save(&self, key: StorageKey, value: &Value) -> Result<()>;
}
