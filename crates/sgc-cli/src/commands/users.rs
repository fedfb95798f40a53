use sgc_core::models::{NewUser, SystemUser, UserRole, UserUpdate};
use sgc_core::SyncEngine;

use crate::cli::UserCommands;
use crate::commands::common::{acting_session, format_user_lines, print_json, print_lines, Context};
use crate::error::CliError;

/// Apply the flags given to `sgc user update` over the current record.
pub fn merge_user_update(
    current: &SystemUser,
    username: Option<String>,
    name: Option<String>,
    role: Option<UserRole>,
    photo: Option<String>,
    password: Option<String>,
) -> UserUpdate {
    UserUpdate {
        id: current.id,
        username: username.unwrap_or_else(|| current.username.clone()),
        name: name.unwrap_or_else(|| current.name.clone()),
        role: role.unwrap_or(current.role),
        photo: photo.or_else(|| current.photo.clone()),
        password,
    }
}

pub async fn run_user(
    engine: &SyncEngine,
    context: &Context,
    command: UserCommands,
) -> Result<(), CliError> {
    match command {
        UserCommands::Add {
            username,
            name,
            role,
            password,
        } => {
            let session = acting_session(engine, &context.user).await?;
            let user = engine
                .add_user(
                    &session,
                    NewUser {
                        username,
                        name,
                        role: role.into(),
                        password,
                    },
                )
                .await?;
            println!("Created user #{} {}", user.id, user.username);
        }
        UserCommands::Update {
            id,
            username,
            name,
            role,
            photo,
            password,
        } => {
            let session = acting_session(engine, &context.user).await?;
            let current = engine
                .users()
                .await
                .into_iter()
                .find(|user| user.id == id)
                .ok_or_else(|| CliError::UnknownUser(format!("#{id}")))?;
            let update = merge_user_update(
                &current,
                username,
                name,
                role.map(Into::into),
                photo,
                password,
            );
            let user = engine.update_user(&session, update).await?;
            println!("Updated user #{} {}", user.id, user.username);
        }
        UserCommands::Delete { id } => {
            let session = acting_session(engine, &context.user).await?;
            let removed = engine.delete_user(&session, id).await?;
            println!("Removed user #{} {}", removed.id, removed.username);
        }
        UserCommands::List { json } => {
            let users = engine.users().await;
            if json {
                // Passwords stay out of listings.
                let redacted = users
                    .into_iter()
                    .map(|user| SystemUser {
                        password: None,
                        ..user
                    })
                    .collect::<Vec<_>>();
                return print_json(&redacted);
            }
            print_lines(&format_user_lines(&users), "No users registered.");
        }
    }
    Ok(())
}
