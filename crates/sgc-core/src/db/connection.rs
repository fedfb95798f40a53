//! SQLite-backed local store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{migrations, LocalStore, StorageKey};
use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// Local store persisted to a single `SQLite` file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure(&conn);
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("connection lock poisoned".to_string()))
    }

    /// Last write time of `key` in Unix milliseconds
    pub fn updated_at(&self, key: StorageKey) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let updated_at = conn
            .query_row(
                "SELECT updated_at FROM kv_store WHERE key = ?",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated_at)
    }
}

/// Configure `SQLite` pragmas; failures leave the defaults in place
fn configure(conn: &Connection) {
    // In-memory databases reject WAL
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
}

impl LocalStore for SqliteStore {
    fn load(&self, key: StorageKey) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|raw| serde_json::from_str(&raw).map_err(Error::from))
            .transpose()
    }

    fn save(&self, key: StorageKey, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
            params![key.as_str(), raw, unix_millis_now()],
        )?;
        Ok(())
    }
}
