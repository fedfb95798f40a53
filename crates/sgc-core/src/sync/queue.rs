//! Mutation queue: durable FIFO of pending operations

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::operation::PendingOperation;
use crate::db::{LocalStore, StorageKey};
use crate::error::{Error, Result};
use crate::remote::{bounded, RemoteDataService, RemoteError, RemoteErrorKind, Table};
use crate::util::iso_timestamp_now;

/// An operation the remote refused; kept for an operator to inspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub operation: PendingOperation,
    pub error: RemoteError,
    pub failed_at: String,
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Applied remotely and dropped
    pub applied: usize,
    /// Already present remotely and dropped
    pub duplicates: usize,
    /// Failed transiently and kept for the next pass
    pub retained: usize,
    /// Refused by the remote and moved to the dead letters
    pub dead_lettered: usize,
}

impl DrainReport {
    pub const fn attempted(&self) -> usize {
        self.applied + self.duplicates + self.retained + self.dead_lettered
    }

    pub const fn is_clean(&self) -> bool {
        self.retained == 0 && self.dead_lettered == 0
    }
}

/// FIFO of operations awaiting the remote, persisted on every change.
///
/// Entries leave the queue only after the remote confirmed them (applied or
/// duplicate) or refused them outright (dead-lettered). Order is never
/// changed.
pub struct MutationQueue {
    store: Arc<dyn LocalStore>,
    pending: Mutex<Vec<PendingOperation>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    drain_lock: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MutationQueue {
    /// Load the queue and dead letters from the store.
    pub fn load(store: Arc<dyn LocalStore>) -> Self {
        let pending = load_entries(store.as_ref(), StorageKey::PendingOperations);
        let dead_letters = load_entries(store.as_ref(), StorageKey::DeadLetters);
        if !pending.is_empty() {
            tracing::info!("Loaded {} pending operation(s)", pending.len());
        }

        Self {
            store,
            pending: Mutex::new(pending),
            dead_letters: Mutex::new(dead_letters),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Append an operation to the tail of the queue.
    pub fn enqueue(&self, operation: PendingOperation) {
        tracing::debug!("Queued {operation}");
        let mut pending = lock(&self.pending);
        pending.push(operation);
        self.persist(StorageKey::PendingOperations, &pending);
    }

    /// Copy of the queue in order
    pub fn pending(&self) -> Vec<PendingOperation> {
        lock(&self.pending).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.pending).is_empty()
    }

    /// Whether any queued operation targets `table`
    pub fn has_pending_for(&self, table: Table) -> bool {
        lock(&self.pending)
            .iter()
            .any(|operation| operation.table == table)
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        lock(&self.dead_letters).clone()
    }

    /// Move one dead letter back to the tail of the queue.
    pub fn requeue_dead_letter(&self, index: usize) -> Result<PendingOperation> {
        let letter = {
            let mut letters = lock(&self.dead_letters);
            if index >= letters.len() {
                return Err(Error::NotFound(format!("dead letter #{index}")));
            }
            let letter = letters.remove(index);
            self.persist(StorageKey::DeadLetters, &letters);
            letter
        };

        self.enqueue(letter.operation.clone());
        Ok(letter.operation)
    }

    /// Move every dead letter back to the tail of the queue, oldest first.
    pub fn requeue_all_dead_letters(&self) -> usize {
        let letters = std::mem::take(&mut *lock(&self.dead_letters));
        if letters.is_empty() {
            return 0;
        }
        self.persist(StorageKey::DeadLetters, &Vec::<DeadLetter>::new());

        let count = letters.len();
        let mut pending = lock(&self.pending);
        pending.extend(letters.into_iter().map(|letter| letter.operation));
        self.persist(StorageKey::PendingOperations, &pending);
        count
    }

    /// Attempt every queued operation once, in order.
    ///
    /// Calls are sequential so that an operation never overtakes one it may
    /// depend on. Never fails: each entry's outcome is isolated. Operations
    /// enqueued while the pass runs stay behind the retained ones.
    pub async fn drain(&self, remote: &dyn RemoteDataService, timeout: Duration) -> DrainReport {
        let _drain = self.drain_lock.lock().await;
        let batch = self.pending();
        let mut report = DrainReport::default();
        if batch.is_empty() {
            return report;
        }

        tracing::info!("Draining {} pending operation(s)", batch.len());
        let mut retained = Vec::new();
        let mut refused = Vec::new();

        for operation in &batch {
            match bounded(timeout, operation.apply(remote)).await {
                Ok(()) => {
                    tracing::debug!("Applied {operation}");
                    report.applied += 1;
                }
                Err(error) => match error.kind {
                    RemoteErrorKind::Duplicate => {
                        tracing::debug!("{operation} already applied remotely: {error}");
                        report.duplicates += 1;
                    }
                    RemoteErrorKind::Rejected => {
                        tracing::warn!("Remote refused {operation}, moving to dead letters: {error}");
                        report.dead_lettered += 1;
                        refused.push(DeadLetter {
                            operation: operation.clone(),
                            error,
                            failed_at: iso_timestamp_now(),
                        });
                    }
                    RemoteErrorKind::Transient => {
                        tracing::warn!("Keeping {operation} queued: {error}");
                        report.retained += 1;
                        retained.push(operation.clone());
                    }
                },
            }
        }

        // Dead letters are written before the shortened queue. A crash in
        // between leaves a refused operation in both stores; the next drain
        // refuses it again and its letter replaces the stale one.
        if !refused.is_empty() {
            let mut letters = lock(&self.dead_letters);
            letters.retain(|letter| {
                !refused
                    .iter()
                    .any(|fresh| fresh.operation == letter.operation)
            });
            letters.extend(refused);
            self.persist(StorageKey::DeadLetters, &letters);
        }

        {
            let mut pending = lock(&self.pending);
            let split = batch.len().min(pending.len());
            let appended = pending.split_off(split);
            retained.extend(appended);
            *pending = retained;
            self.persist(StorageKey::PendingOperations, &pending);
        }

        tracing::info!(
            "Drain finished: {} applied, {} duplicate, {} retained, {} dead-lettered",
            report.applied,
            report.duplicates,
            report.retained,
            report.dead_lettered
        );
        report
    }

    fn persist<T: Serialize>(&self, key: StorageKey, entries: &[T]) {
        let saved = serde_json::to_value(entries)
            .map_err(Error::from)
            .and_then(|value| self.store.save(key, &value));
        if let Err(error) = saved {
            tracing::warn!("Failed to persist {key}: {error}");
        }
    }
}

/// Decode a persisted array entry by entry; unreadable entries are skipped.
fn load_entries<T: serde::de::DeserializeOwned>(store: &dyn LocalStore, key: StorageKey) -> Vec<T> {
    let value = match store.load(key) {
        Ok(Some(value)) => value,
        Ok(None) => return Vec::new(),
        Err(error) => {
            tracing::warn!("Failed to load {key}, starting empty: {error}");
            return Vec::new();
        }
    };

    let Value::Array(entries) = value else {
        tracing::warn!("Stored {key} is not an array, starting empty");
        return Vec::new();
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            serde_json::from_value(entry)
                .inspect_err(|error| tracing::warn!("Skipping unreadable {key} entry #{index}: {error}"))
                .ok()
        })
        .collect()
}
