use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::json;
use sgc_core::models::{
    AuditLog, ChatMessage, GraveKind, GraveLocation, NewCemetery, NewGraves, SystemUser, UserRole,
};
use sgc_core::sync::CollectionOutcome;
use sgc_core::{DrainReport, PendingOperation, ReconcileReport, RowData, Table};

use crate::cli::{BurialArgs, Commands, LocationArgs, QueueCommands};
use crate::commands::common::{
    format_audit_lines, format_message_lines, format_pending_lines, format_user_lines,
    open_engine_at, pending_operation_item, resolve_db_path,
};
use crate::commands::config::{merge_profile, validate_profile};
use crate::commands::messages::join_message;
use crate::commands::records::burial_form;
use crate::commands::sync::{format_reconcile_lines, status_report};
use crate::commands::users::merge_user_update;
use crate::config_profiles::CliProfile;
use crate::error::CliError;
use crate::needs_startup_sync;

fn location_args() -> LocationArgs {
    LocationArgs {
        cemetery: 1,
        block: " A ".to_string(),
        lot: "12".to_string(),
        plot: "S1 ".to_string(),
    }
}

fn user(id: i64, username: &str, role: UserRole) -> SystemUser {
    SystemUser {
        id,
        username: username.to_string(),
        name: username.to_uppercase(),
        role,
        photo: None,
        password: Some("secret1".to_string()),
    }
}

#[test]
fn location_args_are_trimmed() {
    let location: GraveLocation = location_args().into();
    assert_eq!(
        location,
        GraveLocation {
            cemetery_id: 1,
            block: "A".to_string(),
            lot: "12".to_string(),
            plot: "S1".to_string(),
        }
    );
}

#[test]
fn burial_form_maps_every_flag() {
    let form = burial_form(BurialArgs {
        location: location_args(),
        deceased: "Maria Souza".to_string(),
        birth_date: "1940-02-01".to_string(),
        death_date: "2024-05-10".to_string(),
        cause: "Natural".to_string(),
        certificate: "FA-77".to_string(),
        issuing_body: "Cartório 1".to_string(),
        responsible: "João Souza".to_string(),
        document: "123.456.789-00".to_string(),
        phone: "5555-0000".to_string(),
        address: "Rua B, 10".to_string(),
        gravedigger: 4,
        authorization: "AUT-9".to_string(),
    });

    assert_eq!(form.location.block, "A");
    assert_eq!(form.deceased_name, "Maria Souza");
    assert_eq!(form.cause_of_death, "Natural");
    assert_eq!(form.death_certificate_number, "FA-77");
    assert_eq!(form.responsible_name, "João Souza");
    assert_eq!(form.responsible_document, "123.456.789-00");
    assert_eq!(form.gravedigger_id, 4);
    assert_eq!(form.authorization_number, "AUT-9");
}

#[test]
fn merge_user_update_keeps_unset_fields() {
    let current = SystemUser {
        photo: Some("https://img.example.com/a.png".to_string()),
        ..user(7, "clara", UserRole::Standard)
    };

    let update = merge_user_update(&current, None, Some("Clara M.".to_string()), None, None, None);

    assert_eq!(update.id, 7);
    assert_eq!(update.username, "clara");
    assert_eq!(update.name, "Clara M.");
    assert_eq!(update.role, UserRole::Standard);
    assert_eq!(update.photo.as_deref(), Some("https://img.example.com/a.png"));
    assert_eq!(update.password, None);
}

#[test]
fn merge_user_update_applies_role_and_password() {
    let current = user(7, "clara", UserRole::Standard);

    let update = merge_user_update(
        &current,
        Some("clara.m".to_string()),
        None,
        Some(UserRole::Admin),
        None,
        Some("novaSenha1".to_string()),
    );

    assert_eq!(update.username, "clara.m");
    assert_eq!(update.name, "CLARA");
    assert_eq!(update.role, UserRole::Admin);
    assert_eq!(update.password.as_deref(), Some("novaSenha1"));
}

#[test]
fn join_message_trims_and_rejects_empty() {
    let parts = vec!["  bom".to_string(), "dia ".to_string()];
    assert_eq!(join_message(&parts), Some("bom dia".to_string()));
    assert_eq!(join_message(&[" ".to_string()]), None);
    assert_eq!(join_message(&[]), None);
}

#[test]
fn merge_profile_prefers_explicit_values() {
    let existing = CliProfile {
        remote_url: Some("https://old.example.com".to_string()),
        remote_anon_key: Some("old-key".to_string()),
        db_path: Some("/var/lib/sgc/old.db".to_string()),
    };

    let merged = merge_profile(
        &existing,
        Some("https://new.example.com".to_string()),
        None,
        Some("  ".to_string()),
    );

    assert_eq!(merged.remote_url.as_deref(), Some("https://new.example.com"));
    assert_eq!(merged.remote_anon_key.as_deref(), Some("old-key"));
    assert_eq!(merged.db_path.as_deref(), Some("/var/lib/sgc/old.db"));
}

#[test]
fn validate_profile_requires_http_scheme() {
    let profile = CliProfile {
        remote_url: Some("project.example.com".to_string()),
        remote_anon_key: Some("key".to_string()),
        db_path: None,
    };
    assert!(matches!(validate_profile(&profile), Err(CliError::Config(_))));
}

#[test]
fn validate_profile_requires_url_and_key_together() {
    let url_only = CliProfile {
        remote_url: Some("https://project.example.com".to_string()),
        ..CliProfile::default()
    };
    assert!(validate_profile(&url_only).is_err());
    assert!(validate_profile(&CliProfile::default()).is_ok());

    let complete = CliProfile {
        remote_anon_key: Some("key".to_string()),
        ..url_only
    };
    assert!(validate_profile(&complete).is_ok());
}

#[test]
fn resolve_db_path_prefers_explicit_path() {
    let profile = CliProfile {
        db_path: Some("/var/lib/sgc/profile.db".to_string()),
        ..CliProfile::default()
    };
    let explicit = PathBuf::from("/tmp/explicit.db");

    let resolved = resolve_db_path(Some(explicit.clone()), &profile).unwrap();
    assert_eq!(resolved, explicit);
}

#[test]
fn format_reconcile_lines_reports_skipped_run() {
    let lines = format_reconcile_lines(&ReconcileReport::default());
    assert_eq!(lines, vec!["Remote unreachable; nothing synced.".to_string()]);
}

#[test]
fn format_reconcile_lines_list_every_collection() {
    let report = ReconcileReport {
        drain: DrainReport {
            applied: 2,
            duplicates: 1,
            retained: 0,
            dead_lettered: 0,
        },
        collections: vec![
            (Table::Cemeteries, CollectionOutcome::Replaced(3)),
            (Table::Graves, CollectionOutcome::KeptLocal),
            (
                Table::Messages,
                CollectionOutcome::Failed("timeout".to_string()),
            ),
        ],
        remote_available: true,
    };

    let lines = format_reconcile_lines(&report);

    assert_eq!(
        lines[0],
        "Queue: 2 applied, 1 duplicate, 0 still pending, 0 dead-lettered"
    );
    assert!(lines[1].contains("cemiterios") && lines[1].contains("refreshed (3 rows)"));
    assert!(lines[2].contains("sepulturas") && lines[2].contains("kept local data"));
    assert!(lines[3].contains("messages") && lines[3].contains("failed: timeout"));
    assert_eq!(lines.last().map(String::as_str), Some("Sync completed"));
}

#[test]
fn pending_operation_item_lists_written_and_matched_ids() {
    let delete = PendingOperation::delete(Table::Users, "id", json!(42));
    let item = pending_operation_item(3, &delete);

    assert_eq!(item.position, 3);
    assert_eq!(item.table, "usuarios");
    assert_eq!(item.action, "DELETE");
    assert_eq!(item.records, vec![42]);
}

#[test]
fn format_pending_lines_show_position_and_operation() {
    let lines = format_pending_lines(&[PendingOperation::delete(Table::Users, "id", json!(42))]);

    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("  0  DELETE usuarios where id=42"));
}

#[test]
fn format_user_lines_include_role_code() {
    let lines = format_user_lines(&[user(1, "admin", UserRole::Admin)]);
    assert!(lines[0].contains("admin"));
    assert!(lines[0].contains("ADMIN"));
    assert!(!lines[0].contains("secret1"));
}

#[test]
fn format_audit_lines_include_action_and_target() {
    let log = AuditLog {
        id: 1,
        action: "CADASTRO_CEMITERIO".to_string(),
        target_id: "Cemitério Municipal".to_string(),
        details: "Novo cemitério cadastrado. Responsável: Ana".to_string(),
        performed_by: "admin".to_string(),
        timestamp: "2024-05-10T12:00:00.000Z".to_string(),
    };

    let lines = format_audit_lines(&[log]);
    assert!(lines[0].starts_with("2024-05-10T12:00:00.000Z"));
    assert!(lines[0].contains("CADASTRO_CEMITERIO"));
    assert!(lines[0].ends_with("Novo cemitério cadastrado. Responsável: Ana"));
}

#[test]
fn format_message_lines_resolve_usernames_and_mark_unread() {
    let users = vec![user(1, "admin", UserRole::Admin)];
    let message = ChatMessage {
        id: 10,
        sender_id: 1,
        receiver_id: 99,
        content: "Olá".to_string(),
        timestamp: "2024-05-10T12:00:00.000Z".to_string(),
        is_read: false,
    };

    let lines = format_message_lines(&[message], &users);
    assert_eq!(lines, vec!["2024-05-10T12:00:00.000Z* admin -> #99: Olá".to_string()]);
}

#[test]
fn startup_sync_skips_sync_and_queue_commands() {
    assert!(!needs_startup_sync(&Commands::Sync { json: false }));
    assert!(!needs_startup_sync(&Commands::Watch));
    assert!(!needs_startup_sync(&Commands::Queue {
        command: QueueCommands::List { json: false }
    }));
    assert!(needs_startup_sync(&Commands::Status { json: false }));
    assert!(needs_startup_sync(&Commands::Logs {
        limit: 5,
        json: false
    }));
}

#[tokio::test(flavor = "current_thread")]
async fn offline_engine_keeps_changes_local_and_queued() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sgc.db");
    let engine = open_engine_at(&db_path, None, true).unwrap();
    let session = engine
        .find_user_by_username("admin")
        .await
        .unwrap()
        .session();

    engine
        .add_cemetery(
            &session,
            NewCemetery {
                name: "Cemitério Municipal".to_string(),
                manager: "Ana".to_string(),
                ..NewCemetery::default()
            },
        )
        .await
        .unwrap();

    let report = status_report(&engine).await;
    assert!(!report.remote_configured);
    assert_eq!(report.connectivity, "offline");
    assert!(!report.syncing);
    // Cemetery upsert plus its audit entry.
    assert_eq!(report.pending_operations, 2);
    let count_of = |name: &str| {
        report
            .records
            .iter()
            .find(|(collection, _)| collection == name)
            .map(|(_, count)| *count)
    };
    assert_eq!(count_of("cemeteries"), Some(1));
    assert_eq!(count_of("audit_logs"), Some(1));
    assert_eq!(count_of("users"), Some(1));
}

#[tokio::test(flavor = "current_thread")]
async fn reopened_engine_restores_records_and_queue() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sgc.db");

    {
        let engine = open_engine_at(&db_path, None, true).unwrap();
        let session = engine
            .find_user_by_username("admin")
            .await
            .unwrap()
            .session();
        engine
            .add_graves(
                &session,
                NewGraves {
                    cemetery_id: 1,
                    block: "A".to_string(),
                    lot: "12".to_string(),
                    plot: None,
                    kind: GraveKind::Tomb,
                    drawers: 1,
                    family_name: None,
                    latitude: None,
                    longitude: None,
                },
            )
            .await
            .unwrap();
    }

    let engine = open_engine_at(&db_path, None, true).unwrap();
    let graves = engine.graves().await;
    assert_eq!(graves.len(), 1);
    assert_eq!(graves[0].plot, "S1");

    let pending = engine.queue().pending();
    assert_eq!(pending.len(), 2);
    assert!(matches!(
        pending[0].data,
        Some(RowData::Graves(ref rows)) if rows.len() == 1
    ));
    assert_eq!(pending[1].table, Table::AuditLogs);
}
