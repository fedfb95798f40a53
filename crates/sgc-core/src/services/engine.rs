//! Sync engine: owns the collections, the queue and the remote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;

use super::collections::Collections;
use crate::config::EngineConfig;
use crate::db::{LocalStore, StorageKey};
use crate::models::{max_record_id, MessageRow};
use crate::remote::{bounded, RemoteDataService, Table};
use crate::state::{Connectivity, SyncState};
use crate::sync::{
    ensure_bootstrap_admin, merge_messages, merge_snapshot, run_probe, CollectionOutcome,
    ConnectivityMonitor, DrainReport, MutationQueue, Overlay, PendingKeys, PendingOperation,
    ReconcileReport,
};
use crate::util::next_timestamp_id;

/// Offline-first data service shared by every client surface.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct SyncEngine {
    collections: Arc<Mutex<Collections>>,
    store: Arc<dyn LocalStore>,
    queue: Arc<MutationQueue>,
    remote: Option<Arc<dyn RemoteDataService>>,
    connectivity: ConnectivityMonitor,
    sync_state: Arc<watch::Sender<SyncState>>,
    remote_available: Arc<AtomicBool>,
    /// Handlers hold it shared from local write to publish; reconciliation
    /// holds it exclusively, so a snapshot never lands in between.
    write_gate: Arc<RwLock<()>>,
    config: Arc<EngineConfig>,
}

impl SyncEngine {
    /// Load local state and attach the (optional) remote.
    ///
    /// Connectivity starts online when a remote is configured; nothing is
    /// fetched until [`SyncEngine::reconcile`] runs.
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteDataService>>,
        config: EngineConfig,
    ) -> Self {
        let collections = Collections::load(store.as_ref(), &config.bootstrap_admin_password);
        let queue = MutationQueue::load(store.clone());
        let initial = if remote.is_some() {
            Connectivity::Online
        } else {
            tracing::info!("Running in local-only mode (no remote configured)");
            Connectivity::Offline
        };
        let (sync_state, _) = watch::channel(SyncState::Offline);

        Self {
            collections: Arc::new(Mutex::new(collections)),
            store,
            queue: Arc::new(queue),
            remote,
            connectivity: ConnectivityMonitor::new(initial),
            sync_state: Arc::new(sync_state),
            remote_available: Arc::new(AtomicBool::new(false)),
            write_gate: Arc::new(RwLock::new(())),
            config: Arc::new(config),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Whether the last reconciliation reached the remote
    pub fn is_remote_available(&self) -> bool {
        self.remote_available.load(Ordering::SeqCst)
    }

    pub fn sync_state(&self) -> SyncState {
        *self.sync_state.borrow()
    }

    pub fn watch_sync_state(&self) -> watch::Receiver<SyncState> {
        self.sync_state.subscribe()
    }

    /// Busy flag: a drain-then-fetch cycle is running
    pub fn is_syncing(&self) -> bool {
        self.sync_state() == SyncState::Syncing
    }

    /// Copy of every collection
    pub async fn collections(&self) -> Collections {
        self.collections.lock().await.clone()
    }

    /// Drain the queue without fetching.
    pub async fn drain(&self) -> DrainReport {
        match self.online_remote() {
            Some(remote) => {
                self.queue
                    .drain(remote.as_ref(), self.config.remote_timeout)
                    .await
            }
            None => DrainReport::default(),
        }
    }

    /// Bring local state in line with the remote: drain, then fetch.
    ///
    /// Overlapping calls wait for the running one, and so do changes made
    /// meanwhile. Without a reachable remote this is a no-op reporting
    /// nothing.
    pub async fn reconcile(&self) -> ReconcileReport {
        let _running = self.write_gate.write().await;
        let Some(remote) = self.online_remote() else {
            tracing::debug!("Skipping reconciliation: no reachable remote");
            self.set_state(SyncState::Offline);
            return ReconcileReport::default();
        };

        tracing::info!("Reconciliation started");
        self.set_state(SyncState::Syncing);

        let drain = self
            .queue
            .drain(remote.as_ref(), self.config.remote_timeout)
            .await;

        let mut collections = Vec::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let outcome = match bounded(self.config.remote_timeout, remote.select(table)).await {
                Ok(rows) if rows.is_empty() => CollectionOutcome::KeptLocal,
                Ok(rows) => self.apply_snapshot(table, rows).await,
                Err(error) => {
                    tracing::warn!("Failed to fetch {table}, keeping local data: {error}");
                    CollectionOutcome::Failed(error.message)
                }
            };
            collections.push((table, outcome));
        }

        let remote_available = collections
            .iter()
            .any(|(_, outcome)| !matches!(outcome, CollectionOutcome::Failed(_)));
        self.remote_available
            .store(remote_available, Ordering::SeqCst);
        self.set_state(if remote_available {
            SyncState::Synced
        } else {
            SyncState::Error
        });
        tracing::info!(
            "Reconciliation finished (remote {})",
            if remote_available { "available" } else { "unavailable" }
        );

        ReconcileReport {
            drain,
            collections,
            remote_available,
        }
    }

    async fn apply_snapshot(&self, table: Table, rows: Vec<Value>) -> CollectionOutcome {
        let fetched = rows.len();
        let mut collections = self.collections.lock().await;
        // Keys are read under the collections lock so that a handler cannot
        // slip a local write in between.
        let keys = PendingKeys::collect(table, &self.queue.pending());

        let merged = match table {
            Table::Graves => decode_rows(rows).map(|snapshot| {
                collections.graves =
                    merge_snapshot(&collections.graves, snapshot, &keys, Overlay::Append);
            }),
            Table::Cemeteries => decode_rows(rows).map(|snapshot| {
                collections.cemeteries =
                    merge_snapshot(&collections.cemeteries, snapshot, &keys, Overlay::Append);
            }),
            Table::Employees => decode_rows(rows).map(|snapshot| {
                collections.employees =
                    merge_snapshot(&collections.employees, snapshot, &keys, Overlay::Append);
            }),
            Table::AuditLogs => decode_rows(rows).map(|snapshot| {
                collections.audit_logs =
                    merge_snapshot(&collections.audit_logs, snapshot, &keys, Overlay::Prepend);
            }),
            Table::Users => decode_rows(rows).map(|snapshot| {
                let mut users = merge_snapshot(&collections.users, snapshot, &keys, Overlay::Append);
                if ensure_bootstrap_admin(&mut users, &self.config.bootstrap_admin_password) {
                    tracing::info!("Remote users lack administrator #1; restored it locally");
                }
                collections.users = users;
            }),
            Table::Messages => decode_rows::<MessageRow>(rows).map(|snapshot| {
                let mut fallback_id = next_timestamp_id(max_record_id(&collections.messages));
                let snapshot = snapshot
                    .into_iter()
                    .map(|row| {
                        let message = row.into_message(fallback_id);
                        fallback_id += 1;
                        message
                    })
                    .collect();
                collections.messages = merge_messages(&collections.messages, snapshot, &keys);
            }),
        };

        match merged {
            Ok(()) => {
                collections.persist(self.store.as_ref(), table.storage_key());
                tracing::debug!("Replaced {table} with {fetched} remote row(s)");
                CollectionOutcome::Replaced(fetched)
            }
            Err(error) => {
                tracing::warn!("Remote {table} rows are unreadable, keeping local data: {error}");
                CollectionOutcome::Failed(format!("unreadable rows: {error}"))
            }
        }
    }

    /// Run one reconciliation per OFFLINE to ONLINE transition.
    pub fn spawn_connectivity_listener(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let mut edges = self.connectivity.subscribe();

        tokio::spawn(async move {
            loop {
                match edges.recv().await {
                    Ok(Connectivity::Online) => {
                        engine.reconcile().await;
                    }
                    Ok(Connectivity::Offline) => engine.set_state(SyncState::Offline),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {skipped} connectivity transition(s)");
                        if engine.connectivity.is_online() {
                            engine.reconcile().await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Poll the remote for reachability at the configured interval.
    pub fn spawn_probe(&self) -> Option<JoinHandle<()>> {
        let remote = self.remote.clone()?;
        Some(tokio::spawn(run_probe(
            self.connectivity.clone(),
            remote,
            self.config.probe_interval,
            self.config.remote_timeout,
        )))
    }

    /// Taken by every handler that changes data, before its local write and
    /// held until it has published.
    pub(crate) async fn begin_write(&self) -> RwLockReadGuard<'_, ()> {
        self.write_gate.read().await
    }

    pub(crate) async fn lock_collections(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().await
    }

    pub(crate) fn persist(&self, collections: &Collections, key: StorageKey) {
        collections.persist(self.store.as_ref(), key);
    }

    /// Apply `operation` remotely, or queue it.
    ///
    /// Queues directly when offline, when no remote is configured, or when
    /// earlier operations on the same table are still queued, so that this
    /// one cannot overtake them.
    pub(crate) async fn publish(&self, operation: PendingOperation) {
        let Some(remote) = self.online_remote() else {
            tracing::debug!("Offline; queued {operation}");
            self.queue.enqueue(operation);
            return;
        };

        if self.queue.has_pending_for(operation.table) {
            tracing::debug!(
                "Earlier {} operations still queued; queued {operation} behind them",
                operation.table
            );
            self.queue.enqueue(operation);
            return;
        }

        match bounded(self.config.remote_timeout, operation.apply(remote.as_ref())).await {
            Ok(()) => tracing::debug!("Published {operation}"),
            Err(error) if error.is_duplicate() => {
                tracing::debug!("{operation} already present remotely");
            }
            Err(error) => {
                tracing::warn!("Failed to publish {operation}, queued for retry: {error}");
                self.queue.enqueue(operation);
            }
        }
    }

    fn online_remote(&self) -> Option<Arc<dyn RemoteDataService>> {
        self.remote
            .clone()
            .filter(|_| self.connectivity.is_online())
    }

    fn set_state(&self, state: SyncState) {
        self.sync_state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> serde_json::Result<Vec<T>> {
    serde_json::from_value(Value::Array(rows))
}
