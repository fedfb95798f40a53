use serde::Serialize;
use sgc_core::{DeadLetter, SyncEngine};

use crate::cli::QueueCommands;
use crate::commands::common::{
    format_pending_lines, pending_operation_item, print_json, print_lines, PendingOperationItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct DeadLetterItem {
    pub index: usize,
    pub operation: PendingOperationItem,
    pub error: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    pub failed_at: String,
}

pub fn dead_letter_item(index: usize, letter: &DeadLetter) -> DeadLetterItem {
    DeadLetterItem {
        index,
        operation: pending_operation_item(index, &letter.operation),
        error: letter.error.message.clone(),
        code: letter.error.code.clone(),
        status: letter.error.status,
        failed_at: letter.failed_at.clone(),
    }
}

pub fn run_queue(engine: &SyncEngine, command: QueueCommands) -> Result<(), CliError> {
    let queue = engine.queue();
    match command {
        QueueCommands::List { json } => {
            let pending = queue.pending();
            if json {
                let items = pending
                    .iter()
                    .enumerate()
                    .map(|(position, operation)| pending_operation_item(position, operation))
                    .collect::<Vec<_>>();
                return print_json(&items);
            }
            print_lines(&format_pending_lines(&pending), "Queue is empty.");
        }
        QueueCommands::DeadLetters { json } => {
            let letters = queue.dead_letters();
            if json {
                let items = letters
                    .iter()
                    .enumerate()
                    .map(|(index, letter)| dead_letter_item(index, letter))
                    .collect::<Vec<_>>();
                return print_json(&items);
            }
            let lines = letters
                .iter()
                .enumerate()
                .map(|(index, letter)| {
                    format!(
                        "{index:>3}  {}  failed {}: {}",
                        letter.operation, letter.failed_at, letter.error
                    )
                })
                .collect::<Vec<_>>();
            print_lines(&lines, "No dead letters.");
        }
        QueueCommands::Requeue { index: Some(index) } => {
            let operation = queue.requeue_dead_letter(index)?;
            println!("Requeued {operation}");
        }
        QueueCommands::Requeue { index: None } => {
            let count = queue.requeue_all_dead_letters();
            println!("Requeued {count} operation(s)");
        }
    }
    Ok(())
}
