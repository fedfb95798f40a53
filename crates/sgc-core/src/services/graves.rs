//! Grave and burial handlers

use super::engine::SyncEngine;
use crate::db::StorageKey;
use crate::error::{Error, Result};
use crate::models::{
    max_record_id, AuditAction, Burial, BurialForm, Coordinates, Deceased, Grave, GraveLocation,
    GraveStatus, NewGraves, Responsible, Session,
};
use crate::sync::{PendingOperation, RowData};
use crate::util::{normalize_text_option, parse_decimal, unix_millis_now};

const DEFAULT_PLOT: &str = "S1";
const DEFAULT_ALLEY: &str = "Nova Alameda";

impl SyncEngine {
    pub async fn graves(&self) -> Vec<Grave> {
        self.lock_collections().await.graves.clone()
    }

    /// Register a grave, or one grave per drawer for multi-drawer vaults.
    pub async fn add_graves(&self, session: &Session, input: NewGraves) -> Result<Vec<Grave>> {
        let block = required(&input.block, "block")?;
        let lot = required(&input.lot, "lot")?;
        let coordinates = match (input.latitude.as_deref(), input.longitude.as_deref()) {
            (Some(lat), Some(lng)) if !lat.trim().is_empty() && !lng.trim().is_empty() => {
                Some(Coordinates {
                    lat: parse_decimal(lat)
                        .ok_or_else(|| Error::InvalidInput(format!("invalid latitude '{lat}'")))?,
                    lng: parse_decimal(lng)
                        .ok_or_else(|| Error::InvalidInput(format!("invalid longitude '{lng}'")))?,
                })
            }
            _ => None,
        };

        let plots: Vec<String> = if input.drawers > 1 {
            (1..=input.drawers).map(|drawer| format!("G{drawer}")).collect()
        } else {
            vec![normalize_text_option(input.plot.clone()).unwrap_or_else(|| DEFAULT_PLOT.to_string())]
        };

        let _write = self.begin_write().await;
        let created = {
            let mut collections = self.lock_collections().await;
            let first_id = max_record_id(&collections.graves).map_or(1, |max| max + 1);

            let created: Vec<Grave> = plots
                .into_iter()
                .zip(first_id..)
                .map(|(plot, id)| {
                    let location = GraveLocation {
                        cemetery_id: input.cemetery_id,
                        block: block.clone(),
                        lot: lot.clone(),
                        plot,
                    };
                    let mut grave = Grave::new(id, location, input.kind);
                    grave.alley = DEFAULT_ALLEY.to_string();
                    grave.drawers = Some(input.drawers.max(1));
                    grave.family_name = normalize_text_option(input.family_name.clone());
                    grave.coordinates = coordinates;
                    grave
                })
                .collect();

            collections.graves.extend(created.iter().cloned());
            self.persist(&collections, StorageKey::Graves);
            created
        };

        self.publish(PendingOperation::upsert(RowData::Graves(created.clone())))
            .await;
        self.append_audit(
            session,
            AuditAction::GraveRegistered,
            format!("{block}-{lot}"),
            format!(
                "Cadastro de sepultura(s). Q:{block} L:{lot} ({} gavetas)",
                input.drawers
            ),
        )
        .await;

        Ok(created)
    }

    /// Record a burial in the grave at `form.location`, or edit the one
    /// already recorded there.
    ///
    /// Editing an occupied grave is reserved to administrators.
    pub async fn register_burial(&self, session: &Session, form: BurialForm) -> Result<Grave> {
        let deceased_name = required(&form.deceased_name, "deceased name")?;

        let _write = self.begin_write().await;
        let (grave, is_edit) = {
            let mut collections = self.lock_collections().await;
            let grave = collections
                .graves
                .iter_mut()
                .find(|grave| grave.is_at(&form.location))
                .ok_or_else(|| not_found(&form.location))?;

            let is_edit = grave.status == GraveStatus::Occupied;
            if is_edit && !session.is_admin() {
                return Err(Error::PermissionDenied(
                    "only administrators can edit an existing burial".to_string(),
                ));
            }

            fill_burial(grave, &form, deceased_name.clone());
            let grave = grave.clone();
            self.persist(&collections, StorageKey::Graves);
            (grave, is_edit)
        };

        self.publish(PendingOperation::upsert(RowData::Graves(vec![grave.clone()])))
            .await;

        let (action, details) = if is_edit {
            (
                AuditAction::BurialEdited,
                format!(
                    "Edição de dados cadastrais de {deceased_name} (Aut: {})",
                    form.authorization_number
                ),
            )
        } else {
            (
                AuditAction::Burial,
                format!(
                    "Sepultamento realizado: {deceased_name} (Aut: {})",
                    form.authorization_number
                ),
            )
        };
        self.append_audit(session, action, grave.plot.clone(), details)
            .await;

        Ok(grave)
    }

    /// Clear the burial recorded at `location`, freeing the grave.
    pub async fn remove_burial(&self, session: &Session, location: &GraveLocation) -> Result<Grave> {
        if !session.is_admin() {
            return Err(Error::PermissionDenied(
                "only administrators can remove burial records".to_string(),
            ));
        }

        let _write = self.begin_write().await;
        let (grave, deceased_name) = {
            let mut collections = self.lock_collections().await;
            let grave = collections
                .graves
                .iter_mut()
                .find(|grave| grave.is_at(location))
                .ok_or_else(|| not_found(location))?;

            let deceased_name = grave
                .deceased
                .take()
                .map(|deceased| deceased.name)
                .unwrap_or_default();
            grave.responsible = None;
            grave.burial = None;
            grave.status = GraveStatus::Free;

            let grave = grave.clone();
            self.persist(&collections, StorageKey::Graves);
            (grave, deceased_name)
        };

        self.publish(PendingOperation::upsert(RowData::Graves(vec![grave.clone()])))
            .await;
        self.append_audit(
            session,
            AuditAction::BurialRemoved,
            grave.plot.clone(),
            format!("Exclusão do registro de sepultamento de: {deceased_name}"),
        )
        .await;

        Ok(grave)
    }

    /// Store `grave` as given (map edits, attachments, status), replacing
    /// the grave with the same id or adding it.
    pub async fn save_grave(
        &self,
        session: &Session,
        grave: Grave,
        audit: Option<(AuditAction, String)>,
    ) -> Result<Grave> {
        if grave.id <= 0 {
            return Err(Error::InvalidInput(format!("invalid grave id {}", grave.id)));
        }

        let _write = self.begin_write().await;
        {
            let mut collections = self.lock_collections().await;
            match collections
                .graves
                .iter_mut()
                .find(|candidate| candidate.id == grave.id)
            {
                Some(slot) => *slot = grave.clone(),
                None => collections.graves.push(grave.clone()),
            }
            self.persist(&collections, StorageKey::Graves);
        }

        self.publish(PendingOperation::upsert(RowData::Graves(vec![grave.clone()])))
            .await;
        if let Some((action, details)) = audit {
            self.append_audit(session, action, grave.plot.clone(), details)
                .await;
        }

        Ok(grave)
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    normalize_text_option(Some(value.to_string()))
        .ok_or_else(|| Error::InvalidInput(format!("{field} is required")))
}

fn not_found(location: &GraveLocation) -> Error {
    Error::NotFound(format!(
        "grave Q:{} L:{} {} in cemetery #{}",
        location.block, location.lot, location.plot, location.cemetery_id
    ))
}

/// Write the burial records into `grave`, keeping the ids and control
/// number of an existing burial.
fn fill_burial(grave: &mut Grave, form: &BurialForm, deceased_name: String) {
    let now = unix_millis_now();
    let deceased_id = grave.deceased.as_ref().map_or(now, |deceased| deceased.id);
    let responsible_id = grave
        .responsible
        .as_ref()
        .map_or(now, |responsible| responsible.id);
    let (burial_id, control_number) = grave.burial.as_ref().map_or_else(
        || (now, format!("CTR-{now}")),
        |burial| (burial.id, burial.control_number.clone()),
    );
    let extra = grave
        .deceased
        .take()
        .map(|deceased| deceased.extra)
        .unwrap_or_default();

    grave.deceased = Some(Deceased {
        id: deceased_id,
        name: deceased_name,
        birth_date: form.birth_date.clone(),
        death_date: form.death_date.clone(),
        cause_of_death: form.cause_of_death.clone(),
        death_certificate_number: form.death_certificate_number.clone(),
        issuing_body: form.issuing_body.clone(),
        time_of_death: None,
        father_name: None,
        mother_name: None,
        family: grave.family_name.clone(),
        extra,
    });
    grave.responsible = Some(Responsible {
        id: responsible_id,
        name: form.responsible_name.clone(),
        document: form.responsible_document.clone(),
        phone: form.responsible_phone.clone(),
        address: form.responsible_address.clone(),
        witness1: None,
        witness2: None,
    });
    grave.burial = Some(Burial {
        id: burial_id,
        deceased_id,
        grave_id: grave.id,
        responsible_id,
        gravedigger_id: form.gravedigger_id,
        burial_date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        authorization_number: form.authorization_number.clone(),
        control_number,
    });
    grave.status = GraveStatus::Occupied;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::db::MemoryStore;
    use crate::models::{GraveKind, SystemUser, UserRole};
    use crate::remote::Table;
    use pretty_assertions::assert_eq;

    fn offline_engine() -> SyncEngine {
        SyncEngine::new(Arc::new(MemoryStore::new()), None, EngineConfig::default())
    }

    fn admin() -> Session {
        SystemUser::bootstrap_admin("admin123").session()
    }

    fn clerk() -> Session {
        Session {
            user_id: 7,
            username: "clerk".to_string(),
            role: UserRole::Standard,
        }
    }

    fn new_graves(drawers: u32) -> NewGraves {
        NewGraves {
            cemetery_id: 1,
            block: "A".to_string(),
            lot: "12".to_string(),
            plot: None,
            kind: GraveKind::Vault,
            drawers,
            family_name: Some("Silva".to_string()),
            latitude: Some("-23,55".to_string()),
            longitude: Some("-46.63".to_string()),
        }
    }

    fn burial_form(location: GraveLocation) -> BurialForm {
        BurialForm {
            location,
            deceased_name: "José da Silva".to_string(),
            birth_date: "1940-02-01".to_string(),
            death_date: "2024-03-01".to_string(),
            cause_of_death: "Natural".to_string(),
            death_certificate_number: "FA-1".to_string(),
            issuing_body: "SVO".to_string(),
            responsible_name: "Maria".to_string(),
            responsible_document: "123".to_string(),
            responsible_phone: "555".to_string(),
            responsible_address: "Rua 1".to_string(),
            gravedigger_id: 3,
            authorization_number: "AUT-9".to_string(),
        }
    }

    #[tokio::test]
    async fn test_multi_drawer_vault_creates_one_grave_per_drawer() {
        let engine = offline_engine();

        let created = engine.add_graves(&admin(), new_graves(3)).await.unwrap();

        let plots: Vec<_> = created.iter().map(|grave| grave.plot.as_str()).collect();
        assert_eq!(plots, vec!["G1", "G2", "G3"]);
        assert_eq!(
            created.iter().map(|grave| grave.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(created.iter().all(|grave| grave.status == GraveStatus::Free));
        assert_eq!(created[0].coordinates, Some(Coordinates { lat: -23.55, lng: -46.63 }));

        let pending = engine.queue().pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].table, Table::Graves);
        assert_eq!(pending[0].written_ids(), vec![1, 2, 3]);
        assert_eq!(pending[1].table, Table::AuditLogs);
    }

    #[tokio::test]
    async fn test_single_grave_defaults_plot_and_continues_ids() {
        let engine = offline_engine();
        engine.add_graves(&admin(), new_graves(2)).await.unwrap();

        let created = engine.add_graves(&admin(), new_graves(1)).await.unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id, 3);
        assert_eq!(created[0].plot, "S1");
        assert_eq!(created[0].drawers, Some(1));
    }

    #[tokio::test]
    async fn test_invalid_coordinate_is_rejected_before_mutation() {
        let engine = offline_engine();
        let input = NewGraves {
            latitude: Some("north".to_string()),
            ..new_graves(1)
        };

        let result = engine.add_graves(&admin(), input).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(engine.graves().await.is_empty());
        assert!(engine.queue().is_empty());
    }

    #[tokio::test]
    async fn test_burial_lifecycle_and_permissions() {
        let engine = offline_engine();
        let grave = engine
            .add_graves(&admin(), new_graves(1))
            .await
            .unwrap()
            .remove(0);
        let location = GraveLocation {
            cemetery_id: grave.cemetery_id,
            block: grave.block.clone(),
            lot: grave.lot.clone(),
            plot: grave.plot.clone(),
        };

        let buried = engine
            .register_burial(&clerk(), burial_form(location.clone()))
            .await
            .unwrap();
        assert_eq!(buried.status, GraveStatus::Occupied);
        let control = buried.burial.as_ref().unwrap().control_number.clone();
        assert!(control.starts_with("CTR-"));

        let edit = engine
            .register_burial(&clerk(), burial_form(location.clone()))
            .await;
        assert!(matches!(edit, Err(Error::PermissionDenied(_))));

        let edited = engine
            .register_burial(&admin(), burial_form(location.clone()))
            .await
            .unwrap();
        assert_eq!(edited.burial.unwrap().control_number, control);

        assert!(matches!(
            engine.remove_burial(&clerk(), &location).await,
            Err(Error::PermissionDenied(_))
        ));
        let freed = engine.remove_burial(&admin(), &location).await.unwrap();
        assert_eq!(freed.status, GraveStatus::Free);
        assert!(freed.deceased.is_none());

        let actions: Vec<_> = engine
            .audit_logs()
            .await
            .into_iter()
            .map(|log| log.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                "EXCLUSAO_REGISTRO",
                "EDICAO_REGISTRO",
                "SEPULTAMENTO",
                "CADASTRO_SEPULTURA"
            ]
        );
    }

    #[tokio::test]
    async fn test_burial_at_unknown_location_is_not_found() {
        let engine = offline_engine();
        let location = GraveLocation {
            cemetery_id: 9,
            block: "Z".to_string(),
            lot: "1".to_string(),
            plot: "S1".to_string(),
        };

        let result = engine.register_burial(&admin(), burial_form(location)).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(engine.queue().is_empty());
    }

    #[tokio::test]
    async fn test_save_grave_with_optional_audit() {
        let engine = offline_engine();
        let mut grave = engine
            .add_graves(&admin(), new_graves(1))
            .await
            .unwrap()
            .remove(0);
        grave.status = GraveStatus::UnderMaintenance;

        engine.save_grave(&admin(), grave.clone(), None).await.unwrap();
        assert_eq!(engine.graves().await[0].status, GraveStatus::UnderMaintenance);
        assert_eq!(engine.audit_logs().await.len(), 1);

        engine
            .save_grave(
                &admin(),
                grave.clone(),
                Some((AuditAction::BurialEdited, "Status alterado".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(engine.audit_logs().await.len(), 2);

        grave.id = 99;
        engine.save_grave(&admin(), grave.clone(), None).await.unwrap();
        assert_eq!(engine.graves().await.len(), 2);

        grave.id = 0;
        assert!(matches!(
            engine.save_grave(&admin(), grave, None).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
