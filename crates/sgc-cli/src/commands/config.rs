use std::env;
use std::path::PathBuf;

use serde::Serialize;
use sgc_core::config::{REMOTE_ANON_KEY_ENV, REMOTE_URL_ENV};
use sgc_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::{resolve_db_path, resolve_remote_config};
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ResolvedConfig {
    pub profile: String,
    pub db_path: PathBuf,
    pub remote_url: Option<String>,
    pub remote_source: &'static str,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            remote_url,
            anon_key,
            db,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            remote_url,
            anon_key,
            db,
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    remote_url: Option<String>,
    anon_key: Option<String>,
    db: Option<PathBuf>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(
        &existing_profile,
        normalize_text_option(remote_url).or_else(|| env_value(REMOTE_URL_ENV)),
        normalize_text_option(anon_key).or_else(|| env_value(REMOTE_ANON_KEY_ENV)),
        db.map(|path| path.display().to_string()),
    );
    validate_profile(&merged)?;

    *config.profile_mut_or_default(&profile_name) = merged.clone();
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    if merged.remote_url().is_some() && merged.remote_anon_key().is_some() {
        println!("Remote sync for '{profile_name}' is ready. Run `sgc sync`.");
    } else {
        println!("Profile '{profile_name}' has no remote; changes stay local and queued.");
    }
    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&name).cloned().unwrap_or_default();

    let env_remote = env_value(REMOTE_URL_ENV).is_some();
    let remote = resolve_remote_config(&profile)?;
    let resolved = ResolvedConfig {
        profile: name,
        db_path: resolve_db_path(None, &profile)?,
        remote_source: match (&remote, env_remote) {
            (None, _) => "none",
            (Some(_), true) => "environment",
            (Some(_), false) => "profile",
        },
        remote_url: remote.map(|remote| remote.url),
    };
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

/// Overlay explicit values on an existing profile.
pub fn merge_profile(
    existing: &CliProfile,
    remote_url: Option<String>,
    anon_key: Option<String>,
    db_path: Option<String>,
) -> CliProfile {
    CliProfile {
        remote_url: remote_url.or_else(|| existing.remote_url()),
        remote_anon_key: anon_key.or_else(|| existing.remote_anon_key()),
        db_path: normalize_text_option(db_path).or_else(|| existing.db_path.clone()),
    }
}

pub fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.remote_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "remote_url must include http:// or https://".to_string(),
            ));
        }
    }
    if profile.remote_url().is_some() != profile.remote_anon_key().is_some() {
        return Err(CliError::Config(
            "remote_url and anon_key must be configured together".to_string(),
        ));
    }
    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    normalize_text_option(env::var(name).ok())
}
