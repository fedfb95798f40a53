use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] sgc_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unknown user '{0}'. Run `sgc user list` to see registered usernames.")]
    UnknownUser(String),
    #[error("Invalid value: {0}")]
    InvalidArgument(String),
    #[error(
        "Remote sync is not configured. Run `sgc config init --remote-url <URL> --anon-key <KEY>`, or set SGC_REMOTE_URL and SGC_REMOTE_ANON_KEY."
    )]
    RemoteNotConfigured,
}
