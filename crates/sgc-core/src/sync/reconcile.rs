//! Snapshot reconciliation
//!
//! A non-empty remote snapshot replaces the local collection, except for
//! records that operations still queued after the drain are about to write
//! or delete: those keep their local state until the queue publishes them.

use std::collections::HashSet;

use serde::Serialize;

use super::operation::{PendingOperation, RowData};
use super::queue::DrainReport;
use crate::models::{ChatMessage, MessageRow, Record, SystemUser, BOOTSTRAP_ADMIN_ID};
use crate::remote::{Action, Table};

/// What happened to one local collection during reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum CollectionOutcome {
    /// Replaced by a snapshot of this many rows
    Replaced(usize),
    /// Remote returned no rows; local data kept
    KeptLocal,
    /// Fetch or decode failed; local data kept
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub drain: DrainReport,
    pub collections: Vec<(Table, CollectionOutcome)>,
    /// At least one fetch succeeded
    pub remote_available: bool,
}

impl ReconcileReport {
    /// Whether a reconciliation actually ran (remote configured and online)
    pub fn ran(&self) -> bool {
        !self.collections.is_empty()
    }

    pub fn outcome(&self, table: Table) -> Option<&CollectionOutcome> {
        self.collections
            .iter()
            .find(|(candidate, _)| *candidate == table)
            .map(|(_, outcome)| outcome)
    }
}

/// Records of one table that queued operations still refer to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingKeys {
    /// Ids whose local state is waiting to be published
    pub written: HashSet<i64>,
    /// Ids waiting to be deleted remotely
    pub deleted: HashSet<i64>,
    /// Message rows waiting to be published, matched by sender, receiver
    /// and timestamp
    pub messages: Vec<MessageRow>,
}

impl PendingKeys {
    /// Collect the keys of `table` from the queued operations.
    ///
    /// Later operations win: a write queued after a delete of the same id
    /// counts as a write, and the other way round.
    pub fn collect(table: Table, pending: &[PendingOperation]) -> Self {
        let mut keys = Self::default();
        for operation in pending.iter().filter(|operation| operation.table == table) {
            if operation.action == Action::Delete {
                if let Some(id) = operation.matched_id() {
                    keys.written.remove(&id);
                    keys.deleted.insert(id);
                }
                continue;
            }
            for id in operation.written_ids() {
                keys.deleted.remove(&id);
                keys.written.insert(id);
            }
            if let Some(RowData::Message(row)) = &operation.data {
                keys.messages.push(row.clone());
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.deleted.is_empty() && self.messages.is_empty()
    }
}

/// Where locally-kept records missing from the snapshot are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Append,
    /// For newest-first collections
    Prepend,
}

/// Replace `local` with `fetched`, keeping records with queued writes.
pub fn merge_snapshot<R: Record + Clone>(
    local: &[R],
    fetched: Vec<R>,
    keys: &PendingKeys,
    overlay: Overlay,
) -> Vec<R> {
    let local_version = |id: i64| local.iter().find(|record| record.record_id() == id);

    let mut merged: Vec<R> = fetched
        .into_iter()
        .filter(|record| !keys.deleted.contains(&record.record_id()))
        .map(|record| {
            let id = record.record_id();
            if keys.written.contains(&id) {
                local_version(id).cloned().unwrap_or(record)
            } else {
                record
            }
        })
        .collect();

    let kept: Vec<R> = local
        .iter()
        .filter(|record| keys.written.contains(&record.record_id()))
        .filter(|record| {
            !merged
                .iter()
                .any(|candidate| candidate.record_id() == record.record_id())
        })
        .cloned()
        .collect();

    match overlay {
        Overlay::Append => merged.extend(kept),
        Overlay::Prepend => {
            let snapshot = std::mem::replace(&mut merged, kept);
            merged.extend(snapshot);
        }
    }
    merged
}

/// Replace local messages with `fetched`, keeping messages still queued
/// for insertion.
pub fn merge_messages(
    local: &[ChatMessage],
    fetched: Vec<ChatMessage>,
    keys: &PendingKeys,
) -> Vec<ChatMessage> {
    let same_message = |left: &ChatMessage, right: &ChatMessage| {
        left.sender_id == right.sender_id
            && left.receiver_id == right.receiver_id
            && left.timestamp == right.timestamp
    };

    let kept: Vec<ChatMessage> = local
        .iter()
        .filter(|message| keys.messages.iter().any(|row| row.describes(message)))
        .filter(|message| !fetched.iter().any(|other| same_message(other, message)))
        .cloned()
        .collect();

    let mut merged = fetched;
    merged.extend(kept);
    merged
}

/// Make sure administrator #1 exists; returns `true` when it was added.
pub fn ensure_bootstrap_admin(users: &mut Vec<SystemUser>, password: &str) -> bool {
    if users.iter().any(|user| user.id == BOOTSTRAP_ADMIN_ID) {
        return false;
    }
    users.insert(0, SystemUser::bootstrap_admin(password));
    true
}
