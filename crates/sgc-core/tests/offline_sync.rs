//! End-to-end behaviour of the offline queue and reconciliation cycle.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use sgc_core::models::{
    BurialForm, Employee, EmployeeRole, Grave, GraveKind, GraveLocation, GraveStatus, NewGraves,
    Session, SystemUser, UserRole,
};
use sgc_core::remote::{Latency, RemoteCall};
use sgc_core::sync::CollectionOutcome;
use sgc_core::{
    Action, Connectivity, EngineConfig, LocalStore, MemoryRemote, MemoryStore, MutationQueue,
    PendingOperation, RemoteDataService, RemoteError, RowData, SqliteStore, StorageKey, SyncEngine,
    SyncState, Table,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn admin() -> Session {
    SystemUser::bootstrap_admin("admin123").session()
}

fn employee(id: i64, name: &str) -> Employee {
    Employee {
        id,
        name: name.to_string(),
        role: EmployeeRole::Gravedigger,
        registration: format!("M-{id:03}"),
    }
}

fn engine_with(store: Arc<dyn LocalStore>, remote: &Arc<MemoryRemote>) -> SyncEngine {
    SyncEngine::new(
        store,
        Some(remote.clone() as Arc<dyn RemoteDataService>),
        EngineConfig::default(),
    )
}

fn mutated_ids(remote: &MemoryRemote, table: Table) -> Vec<i64> {
    remote
        .mutations()
        .into_iter()
        .filter(|call| call.table() == table)
        .filter_map(|call| match call {
            RemoteCall::Mutation {
                data: Some(data), ..
            } => data["id"].as_i64(),
            _ => None,
        })
        .collect()
}

fn grave_at(id: i64, block: &str, lot: &str, plot: &str) -> Grave {
    Grave::new(
        id,
        GraveLocation {
            cemetery_id: 1,
            block: block.to_string(),
            lot: lot.to_string(),
            plot: plot.to_string(),
        },
        GraveKind::Tomb,
    )
}

fn location(lot: &str) -> GraveLocation {
    GraveLocation {
        cemetery_id: 1,
        block: "A".to_string(),
        lot: lot.to_string(),
        plot: "S1".to_string(),
    }
}

fn new_grave(lot: &str) -> NewGraves {
    NewGraves {
        cemetery_id: 1,
        block: "A".to_string(),
        lot: lot.to_string(),
        plot: None,
        kind: GraveKind::Tomb,
        drawers: 1,
        family_name: None,
        latitude: None,
        longitude: None,
    }
}

fn burial_form(location: GraveLocation) -> BurialForm {
    BurialForm {
        location,
        deceased_name: "Antônio Pereira".to_string(),
        birth_date: "1938-05-04".to_string(),
        death_date: "2024-02-10".to_string(),
        cause_of_death: "Natural".to_string(),
        death_certificate_number: "FA-77".to_string(),
        issuing_body: "SVO".to_string(),
        responsible_name: "Clara Pereira".to_string(),
        responsible_document: "321".to_string(),
        responsible_phone: "555-0101".to_string(),
        responsible_address: "Rua das Flores, 9".to_string(),
        gravedigger_id: 1,
        authorization_number: "AUT-31".to_string(),
    }
}

#[tokio::test]
async fn drain_applies_operations_in_enqueue_order() {
    let remote = MemoryRemote::new();
    let queue = MutationQueue::load(Arc::new(MemoryStore::new()));
    for id in [5, 3, 9, 1, 7] {
        queue.enqueue(PendingOperation::upsert(RowData::Employee(employee(
            id, "worker",
        ))));
    }

    let report = queue.drain(&remote, TIMEOUT).await;

    assert_eq!(report.applied, 5);
    assert!(queue.is_empty());
    assert_eq!(mutated_ids(&remote, Table::Employees), vec![5, 3, 9, 1, 7]);
}

#[tokio::test]
async fn failed_operation_is_retained_until_it_succeeds() {
    let remote = MemoryRemote::new();
    let queue = MutationQueue::load(Arc::new(MemoryStore::new()));
    for (id, name) in [(1, "A"), (2, "B"), (3, "C")] {
        queue.enqueue(PendingOperation::upsert(RowData::Employee(employee(
            id, name,
        ))));
    }
    remote.fail_matching(|call| match call {
        RemoteCall::Mutation {
            data: Some(data), ..
        } if data["id"] == 2 => Some(RemoteError::transient("connection reset")),
        _ => None,
    });

    let first = queue.drain(&remote, TIMEOUT).await;

    assert_eq!((first.applied, first.retained), (2, 1));
    let remaining = queue.pending();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].written_ids(), vec![2]);

    remote.clear_failures();
    let second = queue.drain(&remote, TIMEOUT).await;

    assert_eq!(second.applied, 1);
    assert!(queue.is_empty());
    assert_eq!(remote.rows(Table::Employees).len(), 3);
}

#[tokio::test]
async fn duplicate_insert_is_treated_as_applied() {
    let remote = MemoryRemote::new();
    let queue = MutationQueue::load(Arc::new(MemoryStore::new()));
    let entry = json!({
        "id": 1_700_000_000_000_i64,
        "action": "CADASTRO_CEMITERIO",
        "targetId": "Central",
        "details": "Novo cemitério cadastrado. Responsável: João",
        "performedBy": "admin",
        "timestamp": "2024-01-01T00:00:00.000Z"
    });
    let row = RowData::decode(Table::AuditLogs, entry).unwrap();
    queue.enqueue(PendingOperation::insert(row.clone()));
    queue.enqueue(PendingOperation::insert(row));

    let report = queue.drain(&remote, TIMEOUT).await;

    assert_eq!((report.applied, report.duplicates), (1, 1));
    assert!(queue.is_empty());
    assert!(queue.dead_letters().is_empty());
    assert_eq!(remote.rows(Table::AuditLogs).len(), 1);
}

#[tokio::test]
async fn rejected_operation_moves_to_dead_letters() {
    let remote = MemoryRemote::new();
    let queue = MutationQueue::load(Arc::new(MemoryStore::new()));
    queue.enqueue(PendingOperation::upsert(RowData::Employee(employee(1, "A"))));
    remote.fail_matching(|_| {
        Some(RemoteError::classified(
            "permission denied for table funcionarios",
            Some("42501".to_string()),
            Some(403),
        ))
    });

    let report = queue.drain(&remote, TIMEOUT).await;

    assert_eq!(report.dead_lettered, 1);
    assert!(queue.is_empty());
    let letters = queue.dead_letters();
    assert_eq!(letters.len(), 1);
    assert!(letters[0].error.is_rejected());

    remote.clear_failures();
    queue.requeue_dead_letter(0).unwrap();
    queue.drain(&remote, TIMEOUT).await;
    assert!(queue.dead_letters().is_empty());
    assert_eq!(remote.rows(Table::Employees).len(), 1);
}

#[tokio::test]
async fn queued_change_reaches_remote_before_fetch() {
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);
    engine.connectivity().report(Connectivity::Offline);
    let listener = engine.spawn_connectivity_listener();

    let created = engine
        .add_graves(
            &admin(),
            NewGraves {
                cemetery_id: 1,
                block: "B".to_string(),
                lot: "4".to_string(),
                plot: None,
                kind: GraveKind::EarthGrave,
                drawers: 1,
                family_name: None,
                latitude: None,
                longitude: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(engine.queue().len(), 2);
    assert!(remote.calls().is_empty());

    let mut state = engine.watch_sync_state();
    engine.connectivity().report(Connectivity::Online);
    tokio::time::timeout(TIMEOUT, state.wait_for(|state| *state == SyncState::Synced))
        .await
        .unwrap()
        .unwrap();

    let calls = remote.calls();
    let upsert = calls
        .iter()
        .position(|call| call.table() == Table::Graves && call.action() == Some(Action::Upsert))
        .unwrap();
    let select = calls
        .iter()
        .position(|call| *call == RemoteCall::Select(Table::Graves))
        .unwrap();
    assert!(upsert < select);

    assert!(engine.queue().is_empty());
    let graves = engine.graves().await;
    assert_eq!(graves.len(), 1);
    assert_eq!(graves[0].id, created[0].id);
    assert_eq!(graves[0].alley, "Nova Alameda");

    listener.abort();
}

#[tokio::test]
async fn bootstrap_admin_survives_remote_user_snapshot() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(
        Table::Users,
        vec![json!({"id": 7, "username": "ana", "nome": "Ana", "role": "PADRAO"})],
    );
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);

    let report = engine.reconcile().await;

    assert_eq!(
        report.outcome(Table::Users),
        Some(&CollectionOutcome::Replaced(1))
    );
    let users = engine.users().await;
    let ids: Vec<i64> = users.iter().map(|user| user.id).collect();
    assert_eq!(ids, vec![1, 7]);
    assert_eq!(users[0].role, UserRole::Admin);
}

#[tokio::test]
async fn message_round_trips_through_remote_shape() {
    let remote = Arc::new(MemoryRemote::new());
    let sender = engine_with(Arc::new(MemoryStore::new()), &remote);
    let sent = sender
        .send_message(&admin(), 1, "Relatório de sepultamentos enviado")
        .await
        .unwrap();

    let stored = &remote.rows(Table::Messages)[0];
    assert_eq!(stored["sender_id"], 1);
    assert_eq!(stored["is_read"], false);
    assert!(stored.get("senderId").is_none());

    let receiver = engine_with(Arc::new(MemoryStore::new()), &remote);
    receiver.reconcile().await;
    let fetched = receiver.messages().await;

    assert_eq!(fetched.len(), 1);
    let logical = |message: &sgc_core::models::ChatMessage| {
        (
            message.sender_id,
            message.receiver_id,
            message.content.clone(),
            message.timestamp.clone(),
            message.is_read,
        )
    };
    assert_eq!(logical(&fetched[0]), logical(&sent));

    sender.reconcile().await;
    assert_eq!(sender.messages().await.len(), 1);
}

#[tokio::test]
async fn offline_grave_is_published_on_reconnect() {
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);
    engine.connectivity().report(Connectivity::Offline);

    let mut grave = grave_at(1, "A", "12", "S1");
    grave.status = GraveStatus::Occupied;
    engine.save_grave(&admin(), grave, None).await.unwrap();

    let local = engine.graves().await;
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].status, GraveStatus::Occupied);
    let pending = engine.queue().pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].table, Table::Graves);
    assert_eq!(pending[0].action, Action::Upsert);
    assert_eq!(
        serde_json::to_value(&pending[0]).unwrap()["table"],
        "sepulturas"
    );

    engine.connectivity().report(Connectivity::Online);
    let report = engine.reconcile().await;

    assert_eq!(report.drain.applied, 1);
    assert!(engine.queue().is_empty());
    let rows = remote.rows(Table::Graves);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["quadra"], "A");
    assert_eq!(rows[0]["lote"], "12");
    assert_eq!(rows[0]["sepultura"], "S1");
    assert_eq!(rows[0]["status"], "OCUPADO");
}

#[tokio::test]
async fn empty_remote_collection_keeps_local_records() {
    let store = Arc::new(MemoryStore::new());
    let graves: Vec<Value> = (1..=3)
        .map(|id| serde_json::to_value(grave_at(id, "C", "1", &format!("S{id}"))).unwrap())
        .collect();
    store.save(StorageKey::Graves, &Value::Array(graves)).unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(store, &remote);

    let report = engine.reconcile().await;

    assert_eq!(
        report.outcome(Table::Graves),
        Some(&CollectionOutcome::KeptLocal)
    );
    assert_eq!(engine.graves().await.len(), 3);
    assert_eq!(engine.sync_state(), SyncState::Synced);
}

#[tokio::test]
async fn queued_records_survive_incomplete_snapshot() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(
        Table::Graves,
        vec![serde_json::to_value(grave_at(1, "D", "1", "S1")).unwrap()],
    );
    remote.fail_matching(|call| {
        (call.table() == Table::Graves && call.action().is_some())
            .then(|| RemoteError::transient("gateway timeout"))
    });
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);
    engine.connectivity().report(Connectivity::Offline);
    engine
        .save_grave(&admin(), grave_at(2, "D", "1", "S2"), None)
        .await
        .unwrap();
    engine.connectivity().report(Connectivity::Online);

    let report = engine.reconcile().await;

    assert_eq!(report.drain.retained, 1);
    let ids: Vec<i64> = engine.graves().await.iter().map(|grave| grave.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(engine.queue().len(), 1);
}

#[tokio::test]
async fn queue_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sgc.db");

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let engine = SyncEngine::new(store, None, EngineConfig::default());
        engine
            .add_employee(sgc_core::models::NewEmployee {
                name: "Carlos".to_string(),
                role: EmployeeRole::Watchman,
                registration: "M-9".to_string(),
            })
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(store, &remote);
    assert_eq!(engine.employees().await.len(), 1);
    assert_eq!(engine.queue().len(), 1);

    engine.reconcile().await;

    assert!(engine.queue().is_empty());
    assert_eq!(remote.rows(Table::Employees)[0]["nome"], "Carlos");
}

#[tokio::test]
async fn removed_burial_stays_removed_after_reconcile() {
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);
    engine.add_graves(&admin(), new_grave("12")).await.unwrap();
    engine
        .register_burial(&admin(), burial_form(location("12")))
        .await
        .unwrap();
    engine.remove_burial(&admin(), &location("12")).await.unwrap();
    assert!(engine.queue().is_empty());

    let stored = &remote.rows(Table::Graves)[0];
    assert_eq!(stored["falecido"], Value::Null);
    assert_eq!(stored["responsavel"], Value::Null);
    assert_eq!(stored["sepultamento"], Value::Null);

    engine.reconcile().await;

    let graves = engine.graves().await;
    assert_eq!(graves.len(), 1);
    assert_eq!(graves[0].status, GraveStatus::Free);
    assert!(graves[0].deceased.is_none());
    assert!(graves[0].responsible.is_none());
    assert!(graves[0].burial.is_none());
}

#[tokio::test(start_paused = true)]
async fn grave_added_while_reconciling_keeps_its_id() {
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);
    engine.add_graves(&admin(), new_grave("12")).await.unwrap();
    remote.delay_matching(|call| {
        (call.table() == Table::Graves && call.action().is_some())
            .then_some(Latency::Before(Duration::from_millis(200)))
    });

    let adding = tokio::spawn({
        let engine = engine.clone();
        async move { engine.add_graves(&admin(), new_grave("13")).await }
    });
    tokio::task::yield_now().await;
    engine.reconcile().await;
    let added = adding.await.unwrap().unwrap();

    assert_eq!(added[0].id, 2);
    let ids: Vec<i64> = engine.graves().await.iter().map(|grave| grave.id).collect();
    assert_eq!(ids, vec![1, 2]);

    remote.clear_latency();
    let next = engine.add_graves(&admin(), new_grave("14")).await.unwrap();
    assert_eq!(next[0].id, 3);
    let lots: Vec<Value> = remote
        .rows(Table::Graves)
        .iter()
        .map(|row| row["lote"].clone())
        .collect();
    assert_eq!(lots, vec![json!("12"), json!("13"), json!("14")]);
}

#[tokio::test(start_paused = true)]
async fn message_retried_after_lost_reply_is_stored_once() {
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);
    remote.delay_matching(|call| {
        (call.table() == Table::Messages).then_some(Latency::After(Duration::from_secs(60)))
    });

    let sent = engine
        .send_message(&admin(), 1, "Portão norte fechado às 18h")
        .await
        .unwrap();

    assert_eq!(engine.queue().len(), 1);
    assert_eq!(remote.rows(Table::Messages).len(), 1);

    remote.clear_latency();
    let report = engine.reconcile().await;

    assert_eq!(report.drain.applied, 1);
    assert!(engine.queue().is_empty());
    let stored = remote.rows(Table::Messages);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["id"], json!(sent.id));
    assert_eq!(engine.messages().await, vec![sent]);
}

#[tokio::test(start_paused = true)]
async fn sync_state_reports_syncing_while_reconcile_runs() {
    let remote = Arc::new(MemoryRemote::new());
    let engine = engine_with(Arc::new(MemoryStore::new()), &remote);
    remote.delay_matching(|call| {
        matches!(call, RemoteCall::Select(_)).then_some(Latency::Before(Duration::from_millis(500)))
    });
    let mut states = engine.watch_sync_state();
    assert!(!engine.is_syncing());

    let running = tokio::spawn({
        let engine = engine.clone();
        async move { engine.reconcile().await }
    });
    states.changed().await.unwrap();

    assert_eq!(*states.borrow_and_update(), SyncState::Syncing);
    assert!(engine.is_syncing());

    let report = running.await.unwrap();
    assert!(report.remote_available);
    assert_eq!(engine.sync_state(), SyncState::Synced);
    assert!(!engine.is_syncing());

    remote.set_reachable(false);
    engine.reconcile().await;
    assert_eq!(engine.sync_state(), SyncState::Error);
    assert!(!engine.is_syncing());
}
