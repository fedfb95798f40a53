//! Runtime configuration for the sync engine and its remote.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const REMOTE_URL_ENV: &str = "SGC_REMOTE_URL";
pub const REMOTE_ANON_KEY_ENV: &str = "SGC_REMOTE_ANON_KEY";

const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
const DEFAULT_BOOTSTRAP_ADMIN_PASSWORD: &str = "admin123";

/// Endpoint and public key of the remote data service.
///
/// The anon key is a publishable client key, never a service-role secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl RemoteConfig {
    /// Validate and normalize a URL/key pair.
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        let url = normalize_text_option(Some(url.into()))
            .ok_or_else(|| Error::Config("remote URL must not be empty".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::Config(
                "remote URL must include http:// or https://".to_string(),
            ));
        }
        let anon_key = normalize_text_option(Some(anon_key.into()))
            .ok_or_else(|| Error::Config("remote anon key must not be empty".to_string()))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }

    /// Resolve from optional parts; `None` when either part is missing.
    pub fn resolve(url: Option<String>, anon_key: Option<String>) -> Result<Option<Self>> {
        match (normalize_text_option(url), normalize_text_option(anon_key)) {
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::Config(format!(
                "{REMOTE_ANON_KEY_ENV} is required when a remote URL is set"
            ))),
            (None, Some(_)) => Err(Error::Config(format!(
                "{REMOTE_URL_ENV} is required when an anon key is set"
            ))),
        }
    }

    /// Read `SGC_REMOTE_URL` / `SGC_REMOTE_ANON_KEY` from the environment.
    pub fn from_env() -> Result<Option<Self>> {
        Self::resolve(
            std::env::var(REMOTE_URL_ENV).ok(),
            std::env::var(REMOTE_ANON_KEY_ENV).ok(),
        )
    }
}

/// Tunables of the sync engine
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on any single remote call
    pub remote_timeout: Duration,
    /// Interval between reachability probes
    pub probe_interval: Duration,
    /// Password given to the synthesized administrator #1
    pub bootstrap_admin_password: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            bootstrap_admin_password: DEFAULT_BOOTSTRAP_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EngineConfig")
            .field("remote_timeout", &self.remote_timeout)
            .field("probe_interval", &self.probe_interval)
            .field("bootstrap_admin_password", &"[REDACTED]")
            .finish()
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }
}
