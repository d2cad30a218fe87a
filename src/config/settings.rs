//! Application settings and configuration types.
//!
//! Settings are persisted to `~/.config/carelink/settings.json` (or the
//! platform equivalent) and loaded at startup. A missing file yields defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::Identity;

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the local document store keeps its data.
    pub storage: StorageSettings,
    /// Reconnect policy for live subscriptions.
    pub subscriptions: SubscriptionSettings,
    /// One-shot thread detail fetch policy.
    pub detail: DetailSettings,
    /// Log output configuration.
    pub logging: LoggingSettings,
    /// Signed-in user for the console front end.
    pub session: SessionSettings,
}

impl Settings {
    /// Default location of the settings file, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads settings from `path`, falling back to defaults if it is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings in {}", path.display()))
    }

    /// Writes settings to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing settings to {}", path.display()))
    }
}

/// Local store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file; defaults to `carelink.db` in the platform data dir.
    pub database_path: Option<PathBuf>,
}

impl StorageSettings {
    /// Resolves the database path, if one is configured or derivable.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join("carelink.db")))
    }
}

/// Reconnect policy for dropped or failed live subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    /// Delay before the first reconnect attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for the reconnect delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Reconnect attempts before giving up; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            max_retries: None,
        }
    }
}

impl SubscriptionSettings {
    /// Delay before reconnect attempt number `attempt` (1-based).
    ///
    /// Doubles from `initial_backoff_ms` and saturates at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }

    /// Returns true if another attempt is allowed after `attempts` failures.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// Policy for one-shot thread detail fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSettings {
    /// Per-attempt timeout, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Extra attempts after a failed or timed-out fetch.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds. Doubles per retry.
    pub retry_backoff_ms: u64,
}

impl Default for DetailSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl DetailSettings {
    /// Per-attempt timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1u64 << exponent))
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level directive when `RUST_LOG` is not set (e.g. "info").
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Signed-in user used by the console front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// User id written as the sender id.
    pub user_id: String,
    /// Display name written as the sender name.
    pub user_name: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_id: "admin".to_string(),
            user_name: "Administrator".to_string(),
        }
    }
}

impl SessionSettings {
    /// Builds the identity injected into message writers.
    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id.as_str(), self.user_name.as_str())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "carelink", "carelink")
}
