use sgc_core::SyncEngine;

use crate::cli::MessageCommands;
use crate::commands::common::{
    acting_session, format_audit_lines, format_message_lines, print_json, print_lines,
    user_id_by_username, Context,
};
use crate::error::CliError;

pub fn join_message(parts: &[String]) -> Option<String> {
    let content = parts.join(" ");
    let content = content.trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

pub async fn run_message(
    engine: &SyncEngine,
    context: &Context,
    command: MessageCommands,
) -> Result<(), CliError> {
    let session = acting_session(engine, &context.user).await?;
    match command {
        MessageCommands::Send { to, content } => {
            let content = join_message(&content)
                .ok_or_else(|| CliError::InvalidArgument("message text is empty".to_string()))?;
            let receiver = user_id_by_username(engine, &to).await?;
            let message = engine.send_message(&session, receiver, &content).await?;
            println!("Sent to {to} at {}", message.timestamp);
        }
        MessageCommands::List { with, json } => {
            let messages = match with {
                Some(other) => {
                    let other = user_id_by_username(engine, &other).await?;
                    engine.conversation(&session, other).await
                }
                None => engine
                    .messages()
                    .await
                    .into_iter()
                    .filter(|message| {
                        message.sender_id == session.user_id
                            || message.receiver_id == session.user_id
                    })
                    .collect(),
            };
            if json {
                return print_json(&messages);
            }
            let users = engine.users().await;
            print_lines(&format_message_lines(&messages, &users), "No messages.");
        }
    }
    Ok(())
}

pub async fn run_logs(engine: &SyncEngine, limit: usize, as_json: bool) -> Result<(), CliError> {
    let logs = engine
        .audit_logs()
        .await
        .into_iter()
        .take(limit)
        .collect::<Vec<_>>();
    if as_json {
        return print_json(&logs);
    }
    print_lines(&format_audit_lines(&logs), "Audit trail is empty.");
    Ok(())
}
