use super::engine::SyncEngine;
use crate::db::StorageKey;
use crate::error::{Error, Result};
use crate::models::{max_record_id, AuditAction, Cemetery, NewCemetery, Session};
use crate::sync::{PendingOperation, RowData};
use crate::util::{next_sequential_id, normalize_text_option, parse_decimal};

impl SyncEngine {
    pub async fn cemeteries(&self) -> Vec<Cemetery> {
        self.lock_collections().await.cemeteries.clone()
    }

    /// Register a cemetery. Coordinates that do not parse are stored as 0.
    pub async fn add_cemetery(&self, session: &Session, input: NewCemetery) -> Result<Cemetery> {
        let name = normalize_text_option(Some(input.name))
            .ok_or_else(|| Error::InvalidInput("cemetery name is required".to_string()))?;
        let manager = normalize_text_option(Some(input.manager));

        let _write = self.begin_write().await;
        let cemetery = {
            let mut collections = self.lock_collections().await;
            let cemetery = Cemetery {
                id: next_sequential_id(max_record_id(&collections.cemeteries)),
                name,
                address: input.address.trim().to_string(),
                postal_code: normalize_text_option(input.postal_code),
                phone: normalize_text_option(input.phone),
                latitude: Some(parse_decimal(&input.latitude).unwrap_or(0.0)),
                longitude: Some(parse_decimal(&input.longitude).unwrap_or(0.0)),
                manager: manager.clone(),
            };
            collections.cemeteries.push(cemetery.clone());
            self.persist(&collections, StorageKey::Cemeteries);
            cemetery
        };

        self.publish(PendingOperation::upsert(RowData::Cemetery(cemetery.clone())))
            .await;
        self.append_audit(
            session,
            AuditAction::CemeteryRegistered,
            cemetery.name.clone(),
            format!(
                "Novo cemitério cadastrado. Responsável: {}",
                manager.unwrap_or_default()
            ),
        )
        .await;

        Ok(cemetery)
    }
}
