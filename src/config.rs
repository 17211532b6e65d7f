use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Connection settings for the remote document store.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FirestoreConfig {
    /// REST root, without a trailing slash.
    pub base_url: String,
    pub project_id: String,
    pub timeout_secs: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: "seneparking-f457b".to_string(),
            timeout_secs: 30,
        }
    }
}

impl FirestoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the durable tier lives on the device.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("seneparking.db"),
            max_connections: 5,
        }
    }
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `info` or `seneparking_lib=debug`.
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub firestore: FirestoreConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `SENEPARKING_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("SENEPARKING_FIRESTORE_URL") {
            self.firestore.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(project) = lookup("SENEPARKING_PROJECT_ID") {
            self.firestore.project_id = project;
        }
        if let Some(path) = lookup("SENEPARKING_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(level) = lookup("SENEPARKING_LOG") {
            self.logging.level = level;
        }
        if let Some(secs) = lookup("SENEPARKING_TIMEOUT_SECS") {
            self.firestore.timeout_secs = secs
                .parse()
                .map_err(|e| Error::Config(format!("SENEPARKING_TIMEOUT_SECS: {e}")))?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.firestore.project_id.trim().is_empty() {
            return Err(Error::Config("firestore.project_id must not be empty".into()));
        }
        if self.storage.max_connections == 0 {
            return Err(Error::Config("storage.max_connections must be at least 1".into()));
        }
        Ok(())
    }
}
