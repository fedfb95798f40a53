//! sgc-core - Core library for SGC
//!
//! This crate contains the cemetery record models, the durable local store,
//! the remote data service, the offline mutation queue and the
//! reconciliation engine used by every SGC interface.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{EngineConfig, RemoteConfig};
pub use db::{LocalStore, MemoryStore, SqliteStore, StorageKey};
pub use error::{Error, Result};
pub use remote::{
    Action, MemoryRemote, PostgrestClient, RemoteDataService, RemoteError, RemoteErrorKind, Table,
};
pub use services::{Collections, SyncEngine};
pub use state::{Connectivity, SyncState};
pub use sync::{
    ConnectivityMonitor, DeadLetter, DrainReport, MutationQueue, PendingOperation,
    ReconcileReport, RowData,
};
