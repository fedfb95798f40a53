//! Audit trail

use super::engine::SyncEngine;
use crate::db::StorageKey;
use crate::models::{max_record_id, AuditAction, AuditLog, Session};
use crate::sync::{PendingOperation, RowData};
use crate::util::{iso_timestamp_now, next_timestamp_id};

impl SyncEngine {
    /// Audit entries, newest first
    pub async fn audit_logs(&self) -> Vec<AuditLog> {
        self.lock_collections().await.audit_logs.clone()
    }

    /// Record `action` performed by `session` and publish the entry.
    pub(crate) async fn append_audit(
        &self,
        session: &Session,
        action: AuditAction,
        target_id: String,
        details: String,
    ) -> AuditLog {
        let entry = {
            let mut collections = self.lock_collections().await;
            let entry = AuditLog {
                id: next_timestamp_id(max_record_id(&collections.audit_logs)),
                action: action.code().to_string(),
                target_id,
                details,
                performed_by: session.username.clone(),
                timestamp: iso_timestamp_now(),
            };
            collections.audit_logs.insert(0, entry.clone());
            self.persist(&collections, StorageKey::AuditLogs);
            entry
        };

        tracing::debug!("Audit {} on {}", entry.action, entry.target_id);
        self.publish(PendingOperation::insert(RowData::AuditLog(entry.clone())))
            .await;
        entry
    }
}
