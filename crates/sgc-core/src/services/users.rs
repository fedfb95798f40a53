//! User management handlers

use serde_json::json;

use super::engine::SyncEngine;
use crate::db::StorageKey;
use crate::error::{Error, Result};
use crate::models::{
    max_record_id, validate_password_format, AuditAction, NewUser, Session, SystemUser, UserRow,
    UserUpdate, BOOTSTRAP_ADMIN_ID,
};
use crate::remote::Table;
use crate::sync::{PendingOperation, RowData};
use crate::util::{next_timestamp_id, normalize_text_option};

const INVALID_PASSWORD: &str = "password must be at least 6 letters or digits";

impl SyncEngine {
    pub async fn users(&self) -> Vec<SystemUser> {
        self.lock_collections().await.users.clone()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Option<SystemUser> {
        let username = username.trim();
        self.lock_collections()
            .await
            .users
            .iter()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned()
    }

    /// Create an account. Administrators only.
    ///
    /// The password is kept on the local record, as `update_user` does, so
    /// the account can be checked while offline.
    pub async fn add_user(&self, session: &Session, input: NewUser) -> Result<SystemUser> {
        require_admin(session, "create users")?;
        let username = normalize_text_option(Some(input.username))
            .ok_or_else(|| Error::InvalidInput("username is required".to_string()))?;
        if !validate_password_format(&input.password) {
            return Err(Error::InvalidInput(INVALID_PASSWORD.to_string()));
        }
        let name = normalize_text_option(input.name).unwrap_or_else(|| username.clone());

        let _write = self.begin_write().await;
        let (user, row) = {
            let mut collections = self.lock_collections().await;
            if username_taken(&collections.users, &username, None) {
                return Err(Error::InvalidInput(format!(
                    "username '{username}' is already in use"
                )));
            }

            let user = SystemUser {
                id: next_timestamp_id(max_record_id(&collections.users)),
                username,
                name,
                role: input.role,
                photo: None,
                password: Some(input.password),
            };
            let row = UserRow::from(&user);
            collections.users.push(user.clone());
            self.persist(&collections, StorageKey::Users);
            (user, row)
        };

        self.publish(PendingOperation::upsert(RowData::User(row)))
            .await;
        self.append_audit(
            session,
            AuditAction::UserRegistered,
            user.username.clone(),
            format!("Novo usuário cadastrado. Perfil: {}", user.role),
        )
        .await;

        Ok(user)
    }

    /// Edit an account. Administrators may edit anyone; others only
    /// themselves.
    ///
    /// A `None` password keeps the current one, locally and remotely.
    pub async fn update_user(&self, session: &Session, update: UserUpdate) -> Result<SystemUser> {
        if !session.is_admin() && session.user_id != update.id {
            return Err(Error::PermissionDenied(
                "only administrators can edit other users".to_string(),
            ));
        }
        let username = normalize_text_option(Some(update.username))
            .ok_or_else(|| Error::InvalidInput("username is required".to_string()))?;
        let password = normalize_text_option(update.password);
        if password
            .as_deref()
            .is_some_and(|password| !validate_password_format(password))
        {
            return Err(Error::InvalidInput(INVALID_PASSWORD.to_string()));
        }
        let photo = normalize_text_option(update.photo);

        let _write = self.begin_write().await;
        let user = {
            let mut collections = self.lock_collections().await;
            if username_taken(&collections.users, &username, Some(update.id)) {
                return Err(Error::InvalidInput(format!(
                    "username '{username}' is already in use"
                )));
            }
            let user = collections
                .users
                .iter_mut()
                .find(|user| user.id == update.id)
                .ok_or_else(|| Error::NotFound(format!("user #{}", update.id)))?;

            user.username = username;
            user.name = update.name.trim().to_string();
            user.role = update.role;
            user.photo = photo.clone();
            if password.is_some() {
                user.password = password.clone();
            }
            let user = user.clone();
            self.persist(&collections, StorageKey::Users);
            user
        };

        let row = UserRow {
            id: None,
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
            photo,
            password,
        };
        let operation = if user.id == BOOTSTRAP_ADMIN_ID {
            PendingOperation::upsert(RowData::User(UserRow {
                id: Some(BOOTSTRAP_ADMIN_ID),
                ..row
            }))
        } else {
            PendingOperation::update(RowData::User(row), "id", json!(user.id))
        };
        self.publish(operation).await;
        self.append_audit(
            session,
            AuditAction::UserEdited,
            user.username.clone(),
            format!("Usuário {} atualizado.", user.username),
        )
        .await;

        Ok(user)
    }

    /// Remove an account. Administrators only; administrator #1 stays.
    pub async fn delete_user(&self, session: &Session, user_id: i64) -> Result<SystemUser> {
        require_admin(session, "remove users")?;
        if user_id == BOOTSTRAP_ADMIN_ID {
            return Err(Error::PermissionDenied(
                "the bootstrap administrator cannot be removed".to_string(),
            ));
        }

        let _write = self.begin_write().await;
        let removed = {
            let mut collections = self.lock_collections().await;
            let index = collections
                .users
                .iter()
                .position(|user| user.id == user_id)
                .ok_or_else(|| Error::NotFound(format!("user #{user_id}")))?;
            let removed = collections.users.remove(index);
            self.persist(&collections, StorageKey::Users);
            removed
        };

        self.publish(PendingOperation::delete(Table::Users, "id", json!(user_id)))
            .await;
        self.append_audit(
            session,
            AuditAction::UserRemoved,
            removed.username.clone(),
            format!("Usuário {} removido do sistema.", removed.username),
        )
        .await;

        Ok(removed)
    }
}

fn require_admin(session: &Session, what: &str) -> Result<()> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(Error::PermissionDenied(format!(
            "only administrators can {what}"
        )))
    }
}

fn username_taken(users: &[SystemUser], username: &str, except: Option<i64>) -> bool {
    users
        .iter()
        .filter(|user| Some(user.id) != except)
        .any(|user| user.username.eq_ignore_ascii_case(username))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::db::MemoryStore;
    use crate::models::UserRole;
    use crate::remote::{Action, MemoryRemote, RemoteDataService};
    use pretty_assertions::assert_eq;

    fn admin() -> Session {
        SystemUser::bootstrap_admin("admin123").session()
    }

    fn new_user(username: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            name: None,
            role: UserRole::Standard,
            password: password.to_string(),
        }
    }

    fn offline_engine() -> SyncEngine {
        SyncEngine::new(Arc::new(MemoryStore::new()), None, EngineConfig::default())
    }

    #[tokio::test]
    async fn test_add_user_validates_before_mutating() {
        let engine = offline_engine();

        let short = engine.add_user(&admin(), new_user("ana", "abc")).await;
        let symbols = engine.add_user(&admin(), new_user("ana", "abc 12345")).await;
        let taken = engine.add_user(&admin(), new_user("ADMIN", "segredo1")).await;

        assert!(matches!(short, Err(Error::InvalidInput(_))));
        assert!(matches!(symbols, Err(Error::InvalidInput(_))));
        assert!(matches!(taken, Err(Error::InvalidInput(_))));
        assert_eq!(engine.users().await.len(), 1);
        assert!(engine.queue().is_empty());
    }

    #[tokio::test]
    async fn test_add_user_keeps_password_locally_and_remotely() {
        let engine = offline_engine();

        let user = engine
            .add_user(&admin(), new_user("ana", "segredo1"))
            .await
            .unwrap();

        assert_eq!(user.name, "ana");
        assert_eq!(user.password.as_deref(), Some("segredo1"));
        assert_eq!(
            engine.find_user_by_username("ana").await.unwrap().password,
            user.password
        );
        let pending = engine.queue().pending();
        assert_eq!(pending[0].action, Action::Upsert);
        let Some(RowData::User(row)) = &pending[0].data else {
            panic!("expected a user row");
        };
        assert_eq!(row.id, Some(user.id));
        assert_eq!(row.password.as_deref(), Some("segredo1"));
        assert_eq!(engine.audit_logs().await[0].details, "Novo usuário cadastrado. Perfil: PADRAO");
    }

    #[tokio::test]
    async fn test_only_admins_manage_other_users() {
        let engine = offline_engine();
        let ana = engine
            .add_user(&admin(), new_user("ana", "segredo1"))
            .await
            .unwrap();
        let ana_session = ana.session();

        assert!(matches!(
            engine.add_user(&ana_session, new_user("rui", "segredo2")).await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            engine.delete_user(&ana_session, ana.id).await,
            Err(Error::PermissionDenied(_))
        ));
        let edit_admin = UserUpdate {
            id: BOOTSTRAP_ADMIN_ID,
            username: "admin".to_string(),
            name: "Hijack".to_string(),
            role: UserRole::Admin,
            photo: None,
            password: None,
        };
        assert!(matches!(
            engine.update_user(&ana_session, edit_admin).await,
            Err(Error::PermissionDenied(_))
        ));

        let own = UserUpdate {
            id: ana.id,
            username: "ana".to_string(),
            name: "Ana Souza".to_string(),
            role: UserRole::Standard,
            photo: None,
            password: Some("novasenha9".to_string()),
        };
        let updated = engine.update_user(&ana_session, own).await.unwrap();
        assert_eq!(updated.name, "Ana Souza");
        assert_eq!(updated.password.as_deref(), Some("novasenha9"));
    }

    #[tokio::test]
    async fn test_update_matches_on_id_except_for_bootstrap_admin() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed(
            Table::Users,
            vec![json!({"id": 55, "username": "rui", "nome": "Rui", "role": "PADRAO"})],
        );
        let engine = SyncEngine::new(
            Arc::new(MemoryStore::new()),
            Some(remote.clone() as Arc<dyn RemoteDataService>),
            EngineConfig::default(),
        );
        engine.reconcile().await;
        remote.clear_calls();

        engine
            .update_user(
                &admin(),
                UserUpdate {
                    id: 55,
                    username: "rui".to_string(),
                    name: "Rui Lima".to_string(),
                    role: UserRole::Admin,
                    photo: None,
                    password: None,
                },
            )
            .await
            .unwrap();
        let admin_user = engine.find_user_by_username("admin").await.unwrap();
        engine
            .update_user(
                &admin(),
                UserUpdate {
                    id: admin_user.id,
                    username: admin_user.username,
                    name: "Chefe".to_string(),
                    role: UserRole::Admin,
                    photo: None,
                    password: None,
                },
            )
            .await
            .unwrap();

        let user_actions: Vec<_> = remote
            .mutations()
            .into_iter()
            .filter(|call| call.table() == Table::Users)
            .filter_map(|call| call.action())
            .collect();
        assert_eq!(user_actions, vec![Action::Update, Action::Upsert]);
        let rows = remote.rows(Table::Users);
        let rui = rows.iter().find(|row| row["id"] == 55).unwrap();
        assert_eq!(rui["nome"], "Rui Lima");
        assert_eq!(rui["role"], "ADMIN");
        assert!(rows.iter().any(|row| row["id"] == 1 && row["nome"] == "Chefe"));
    }

    #[tokio::test]
    async fn test_delete_user_guards_bootstrap_admin() {
        let engine = offline_engine();
        let ana = engine
            .add_user(&admin(), new_user("ana", "segredo1"))
            .await
            .unwrap();

        assert!(matches!(
            engine.delete_user(&admin(), BOOTSTRAP_ADMIN_ID).await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            engine.delete_user(&admin(), 424_242).await,
            Err(Error::NotFound(_))
        ));

        let removed = engine.delete_user(&admin(), ana.id).await.unwrap();

        assert_eq!(removed.username, "ana");
        assert!(engine.find_user_by_username("ana").await.is_none());
        let last_user_op = engine
            .queue()
            .pending()
            .into_iter()
            .rev()
            .find(|operation| operation.table == Table::Users)
            .unwrap();
        assert_eq!(last_user_op.action, Action::Delete);
        assert_eq!(last_user_op.matched_id(), Some(ana.id));
        assert_eq!(
            engine.audit_logs().await[0].details,
            "Usuário ana removido do sistema."
        );
    }
}
