//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sgc_core::util::normalize_text_option;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const PROFILE_ENV: &str = "SGC_PROFILE";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub remote_anon_key: Option<String>,
    /// Local database used when `--db-path` is not given
    #[serde(default)]
    pub db_path: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("sgc").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

fn profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

fn describe(action: &str, path: &Path, error: impl std::fmt::Display) -> String {
    format!("Failed to {action} {}: {error}", path.display())
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    /// Read the profile file; a missing file is an empty configuration.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => return Err(describe("read profiles at", path, error)),
        };

        serde_json::from_str::<Self>(&raw)
            .map(Self::normalized)
            .map_err(|error| describe("parse profiles at", path, error))
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|error| describe("create", dir, error))?;
        }

        let encoded = serde_json::to_string_pretty(&self.clone().normalized())
            .map_err(|error| format!("Failed to encode profiles: {error}"))?;
        std::fs::write(path, encoded).map_err(|error| describe("write profiles to", path, error))
    }

    /// `--profile`, then `SGC_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        profile_name(explicit)
            .or_else(|| profile_name(std::env::var(PROFILE_ENV).ok().as_deref()))
            .or_else(|| profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalized(mut self) -> Self {
        self.active_profile = profile_name(self.active_profile.as_deref());
        self.profiles.values_mut().for_each(CliProfile::normalize);
        self
    }
}

impl CliProfile {
    pub fn remote_url(&self) -> Option<String> {
        normalize_text_option(self.remote_url.clone())
    }

    pub fn remote_anon_key(&self) -> Option<String> {
        normalize_text_option(self.remote_anon_key.clone())
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        normalize_text_option(self.db_path.clone()).map(PathBuf::from)
    }

    fn normalize(&mut self) {
        self.remote_url = normalize_text_option(self.remote_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.remote_anon_key = normalize_text_option(self.remote_anon_key.clone());
        self.db_path = normalize_text_option(self.db_path.clone());
    }
}
