use serde::Serialize;
use sgc_core::sync::CollectionOutcome;
use sgc_core::{ReconcileReport, SyncEngine, Table};

use crate::commands::common::print_json;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub remote_configured: bool,
    pub connectivity: &'static str,
    pub sync_state: &'static str,
    pub syncing: bool,
    pub pending_operations: usize,
    pub dead_letters: usize,
    pub records: Vec<(String, usize)>,
}

pub async fn status_report(engine: &SyncEngine) -> StatusReport {
    let collections = engine.collections().await;
    let records = Table::ALL
        .into_iter()
        .map(|table| {
            let key = table.storage_key();
            (key.to_string(), collections.count(key))
        })
        .collect();

    StatusReport {
        remote_configured: engine.has_remote(),
        connectivity: engine.connectivity().current().label(),
        sync_state: engine.sync_state().label(),
        syncing: engine.is_syncing(),
        pending_operations: engine.queue().len(),
        dead_letters: engine.queue().dead_letters().len(),
        records,
    }
}

pub async fn run_status(engine: &SyncEngine, as_json: bool) -> Result<(), CliError> {
    let report = status_report(engine).await;
    if as_json {
        return print_json(&report);
    }

    let remote = if report.remote_configured {
        "configured"
    } else {
        "not configured (local only)"
    };
    println!("Remote:        {remote}");
    println!("Connectivity:  {}", report.connectivity);
    println!("Sync state:    {}", report.sync_state);
    println!("Pending ops:   {}", report.pending_operations);
    println!("Dead letters:  {}", report.dead_letters);
    for (collection, count) in &report.records {
        println!("  {collection:<12} {count}");
    }
    Ok(())
}

pub async fn run_sync(engine: &SyncEngine, as_json: bool) -> Result<(), CliError> {
    if !engine.has_remote() {
        return Err(CliError::RemoteNotConfigured);
    }

    let report = engine.reconcile().await;
    if as_json {
        return print_json(&report);
    }
    for line in format_reconcile_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

/// Keep syncing on every reconnect until interrupted.
pub async fn run_watch(engine: &SyncEngine) -> Result<(), CliError> {
    let Some(probe) = engine.spawn_probe() else {
        return Err(CliError::RemoteNotConfigured);
    };
    let listener = engine.spawn_connectivity_listener();
    let mut state = engine.watch_sync_state();

    println!("Watching connectivity; press Ctrl-C to stop.");
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                if engine.is_syncing() {
                    println!("Syncing {} queued change(s)...", engine.queue().len());
                } else {
                    println!(
                        "Sync state: {} ({} pending)",
                        current.label(),
                        engine.queue().len()
                    );
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    probe.abort();
    listener.abort();
    Ok(())
}

pub fn format_reconcile_lines(report: &ReconcileReport) -> Vec<String> {
    if !report.ran() {
        return vec!["Remote unreachable; nothing synced.".to_string()];
    }

    let drain = &report.drain;
    let mut lines = vec![format!(
        "Queue: {} applied, {} duplicate, {} still pending, {} dead-lettered",
        drain.applied, drain.duplicates, drain.retained, drain.dead_lettered
    )];
    lines.extend(report.collections.iter().map(|(table, outcome)| {
        let outcome = match outcome {
            CollectionOutcome::Replaced(rows) => format!("refreshed ({rows} rows)"),
            CollectionOutcome::KeptLocal => "remote empty, kept local data".to_string(),
            CollectionOutcome::Failed(reason) => format!("failed: {reason}"),
        };
        format!("  {:<14} {outcome}", table.as_str())
    }));
    lines.push(if report.remote_available {
        "Sync completed".to_string()
    } else {
        "Remote unavailable; local data kept".to_string()
    });
    lines
}
