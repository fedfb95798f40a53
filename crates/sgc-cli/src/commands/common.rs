use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sgc_core::models::{AuditLog, Cemetery, ChatMessage, Employee, Grave, Session, SystemUser};
use sgc_core::{
    Action, Connectivity, EngineConfig, PendingOperation, PostgrestClient, RemoteConfig,
    RemoteDataService, SqliteStore, SyncEngine,
};

use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

const DB_PATH_ENV: &str = "SGC_DB_PATH";

/// Global options shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub db_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub offline: bool,
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct PendingOperationItem {
    pub position: usize,
    pub table: String,
    pub action: String,
    pub records: Vec<i64>,
    pub queued_at: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>, profile: &CliProfile) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .or_else(|| profile.db_path())
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("sgc").join("sgc.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Remote settings from the environment, falling back to the profile.
pub fn resolve_remote_config(profile: &CliProfile) -> Result<Option<RemoteConfig>, CliError> {
    if let Some(config) = RemoteConfig::from_env()? {
        return Ok(Some(config));
    }
    Ok(RemoteConfig::resolve(
        profile.remote_url(),
        profile.remote_anon_key(),
    )?)
}

pub fn load_profile(explicit: Option<&str>) -> Result<CliProfile, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = config.resolve_profile_name(explicit);
    Ok(config.profile(&name).cloned().unwrap_or_default())
}

pub fn open_engine(context: &Context) -> Result<SyncEngine, CliError> {
    let profile = load_profile(context.profile.as_deref())?;
    let db_path = resolve_db_path(context.db_path.clone(), &profile)?;
    open_engine_at(&db_path, resolve_remote_config(&profile)?, context.offline)
}

pub fn open_engine_at(
    db_path: &Path,
    remote_config: Option<RemoteConfig>,
    offline: bool,
) -> Result<SyncEngine, CliError> {
    let store = Arc::new(SqliteStore::open(db_path)?);
    let remote = remote_config
        .map(|config| PostgrestClient::new(&config))
        .transpose()?
        .map(|client| Arc::new(client) as Arc<dyn RemoteDataService>);

    let engine = SyncEngine::new(store, remote, EngineConfig::default());
    if offline {
        engine.connectivity().report(Connectivity::Offline);
    }
    Ok(engine)
}

/// Session of the user named by `--user`
pub async fn acting_session(engine: &SyncEngine, username: &str) -> Result<Session, CliError> {
    engine
        .find_user_by_username(username)
        .await
        .map(|user| user.session())
        .ok_or_else(|| CliError::UnknownUser(username.trim().to_string()))
}

pub async fn user_id_by_username(engine: &SyncEngine, username: &str) -> Result<i64, CliError> {
    engine
        .find_user_by_username(username)
        .await
        .map(|user| user.id)
        .ok_or_else(|| CliError::UnknownUser(username.trim().to_string()))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_lines(lines: &[String], empty: &str) {
    if lines.is_empty() {
        println!("{empty}");
    }
    for line in lines {
        println!("{line}");
    }
}

pub fn pending_operation_item(position: usize, operation: &PendingOperation) -> PendingOperationItem {
    let mut records = operation.written_ids();
    if matches!(operation.action, Action::Delete) {
        records.extend(operation.matched_id());
    }
    PendingOperationItem {
        position,
        table: operation.table.to_string(),
        action: operation.action.to_string(),
        records,
        queued_at: operation.timestamp.clone(),
    }
}

pub fn format_pending_lines(pending: &[PendingOperation]) -> Vec<String> {
    pending
        .iter()
        .enumerate()
        .map(|(position, operation)| format!("{position:>3}  {operation}  ({})", operation.timestamp))
        .collect()
}

pub fn format_grave_lines(graves: &[Grave]) -> Vec<String> {
    graves
        .iter()
        .map(|grave| {
            let occupant = grave
                .deceased
                .as_ref()
                .map(|deceased| format!("  {}", deceased.name))
                .unwrap_or_default();
            format!(
                "#{:<6} cem {:<3} {:<20} {:<14} {}{occupant}",
                grave.id,
                grave.cemetery_id,
                grave.label(),
                grave.kind.as_str(),
                grave.status
            )
        })
        .collect()
}

pub fn format_cemetery_lines(cemeteries: &[Cemetery]) -> Vec<String> {
    cemeteries
        .iter()
        .map(|cemetery| {
            let manager = cemetery.manager.as_deref().unwrap_or("-");
            format!(
                "#{:<4} {}  ({})  manager: {manager}",
                cemetery.id, cemetery.name, cemetery.address
            )
        })
        .collect()
}

pub fn format_employee_lines(employees: &[Employee]) -> Vec<String> {
    employees
        .iter()
        .map(|employee| {
            format!(
                "#{:<4} {:<30} {:<20} {}",
                employee.id,
                employee.name,
                employee.role.as_str(),
                employee.registration
            )
        })
        .collect()
}

pub fn format_user_lines(users: &[SystemUser]) -> Vec<String> {
    users
        .iter()
        .map(|user| {
            format!(
                "#{:<14} {:<16} {:<8} {}",
                user.id,
                user.username,
                user.role.as_str(),
                user.name
            )
        })
        .collect()
}

pub fn format_audit_lines(logs: &[AuditLog]) -> Vec<String> {
    logs.iter()
        .map(|log| {
            format!(
                "{}  {:<18} {:<12} {:<14} {}",
                log.timestamp, log.action, log.performed_by, log.target_id, log.details
            )
        })
        .collect()
}

pub fn format_message_lines(messages: &[ChatMessage], users: &[SystemUser]) -> Vec<String> {
    let name_of = |id: i64| {
        users
            .iter()
            .find(|user| user.id == id)
            .map_or_else(|| format!("#{id}"), |user| user.username.clone())
    };

    messages
        .iter()
        .map(|message| {
            let unread = if message.is_read { " " } else { "*" };
            format!(
                "{}{unread} {} -> {}: {}",
                message.timestamp,
                name_of(message.sender_id),
                name_of(message.receiver_id),
                message.content
            )
        })
        .collect()
}
