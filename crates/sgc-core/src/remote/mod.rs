//! Remote data service
//!
//! Table-oriented CRUD against the authoritative backend. The service is
//! unreliable by assumption: every call may fail, and failures carry a
//! structured [`RemoteErrorKind`] so callers can tell "already applied"
//! from "try again later" from "will never succeed".

mod memory;
mod postgrest;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db::StorageKey;

pub use memory::{Latency, MemoryRemote, RemoteCall};
pub use postgrest::PostgrestClient;

/// Postgres SQLSTATE for `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

const DUPLICATE_KEY_SENTINEL: &str = "duplicate key";

/// Remote tables mirrored by local collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    #[serde(rename = "sepulturas")]
    Graves,
    #[serde(rename = "cemiterios")]
    Cemeteries,
    #[serde(rename = "funcionarios")]
    Employees,
    #[serde(rename = "usuarios")]
    Users,
    #[serde(rename = "audit_logs")]
    AuditLogs,
    #[serde(rename = "messages")]
    Messages,
}

impl Table {
    pub const ALL: [Self; 6] = [
        Self::Cemeteries,
        Self::Employees,
        Self::Graves,
        Self::AuditLogs,
        Self::Users,
        Self::Messages,
    ];

    /// Wire name of the table
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Graves => "sepulturas",
            Self::Cemeteries => "cemiterios",
            Self::Employees => "funcionarios",
            Self::Users => "usuarios",
            Self::AuditLogs => "audit_logs",
            Self::Messages => "messages",
        }
    }

    /// Local collection holding this table's rows
    pub const fn storage_key(self) -> StorageKey {
        match self {
            Self::Graves => StorageKey::Graves,
            Self::Cemeteries => StorageKey::Cemeteries,
            Self::Employees => StorageKey::Employees,
            Self::Users => StorageKey::Users,
            Self::AuditLogs => StorageKey::AuditLogs,
            Self::Messages => StorageKey::Messages,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|table| table.as_str() == s.trim())
            .ok_or_else(|| format!("unknown table '{s}'"))
    }
}

/// Mutation kinds understood by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Upsert => "UPSERT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the action targets rows through a match field/value pair
    pub const fn uses_match(self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a remote failure should be treated by the mutation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The row already exists remotely; the mutation is already applied.
    Duplicate,
    /// Network, timeout or server-side failure; retry later.
    Transient,
    /// The remote refused the mutation; retrying will not help.
    Rejected,
}

/// Failure reported by a [`RemoteDataService`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
    /// Postgres SQLSTATE or PostgREST error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// HTTP status of the failed response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

pub type RemoteResult<T> = Result<T, RemoteError>;

impl RemoteError {
    /// Build an error, deriving its kind from the code, status and message.
    pub fn classified(message: impl Into<String>, code: Option<String>, status: Option<u16>) -> Self {
        let message = message.into();
        let kind = classify(code.as_deref(), status, &message);
        Self {
            kind,
            message,
            code,
            status,
        }
    }

    /// Build an error from a bare message, for services that expose no codes.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::classified(message, None, None)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Transient,
            message: message.into(),
            code: None,
            status: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Rejected,
            message: message.into(),
            code: None,
            status: None,
        }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Duplicate,
            message: message.into(),
            code: Some(UNIQUE_VIOLATION.to_string()),
            status: Some(409),
        }
    }

    /// A call that did not complete within `limit`.
    pub fn timeout(limit: Duration) -> Self {
        Self::transient(format!("remote call timed out after {}ms", limit.as_millis()))
    }

    pub const fn is_duplicate(&self) -> bool {
        matches!(self.kind, RemoteErrorKind::Duplicate)
    }

    pub const fn is_transient(&self) -> bool {
        matches!(self.kind, RemoteErrorKind::Transient)
    }

    pub const fn is_rejected(&self) -> bool {
        matches!(self.kind, RemoteErrorKind::Rejected)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|status| status.as_u16());
        if error.is_timeout() || error.is_connect() || status.is_none() {
            return Self {
                kind: RemoteErrorKind::Transient,
                message: error.to_string(),
                code: None,
                status,
            };
        }
        Self::classified(error.to_string(), None, status)
    }
}

/// Classify a remote failure.
///
/// Structured signals win: a unique violation is a duplicate, HTTP statuses
/// split into retryable and refused. Only failures with neither a code nor a
/// status fall back to matching the message text.
pub fn classify(code: Option<&str>, status: Option<u16>, message: &str) -> RemoteErrorKind {
    if code == Some(UNIQUE_VIOLATION) {
        return RemoteErrorKind::Duplicate;
    }

    if let Some(status) = status {
        return match status {
            408 | 425 | 429 => RemoteErrorKind::Transient,
            400..=499 => RemoteErrorKind::Rejected,
            _ => RemoteErrorKind::Transient,
        };
    }

    if code.is_none() && message.to_lowercase().contains(DUPLICATE_KEY_SENTINEL) {
        RemoteErrorKind::Duplicate
    } else {
        RemoteErrorKind::Transient
    }
}

/// Run a remote call with an upper bound on its duration.
///
/// A call still pending at `limit` is abandoned and reported as transient.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = RemoteResult<T>>,
) -> RemoteResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(RemoteError::timeout(limit)))
}

/// Table-oriented CRUD over the network.
///
/// Payloads are JSON rows in the remote column layout.
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Full-table read
    async fn select(&self, table: Table) -> RemoteResult<Vec<Value>>;

    /// Insert one row, or an array of rows
    async fn insert(&self, table: Table, data: &Value) -> RemoteResult<()>;

    /// Update rows whose `match_field` equals `match_value`
    async fn update(
        &self,
        table: Table,
        data: &Value,
        match_field: &str,
        match_value: &Value,
    ) -> RemoteResult<()>;

    /// Insert-or-update keyed by the primary key carried in `data`
    async fn upsert(&self, table: Table, data: &Value) -> RemoteResult<()>;

    /// Delete rows whose `match_field` equals `match_value`
    async fn delete(&self, table: Table, match_field: &str, match_value: &Value)
        -> RemoteResult<()>;

    /// Cheap reachability check
    async fn ping(&self) -> RemoteResult<()>;
}
