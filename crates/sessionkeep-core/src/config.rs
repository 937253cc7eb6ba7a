//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! which service to talk to, where the session is persisted and how
//! incomplete sign-in responses are treated.
//!
//! Configuration is stored at `~/.config/sessionkeep/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::ApiClient;
use crate::auth::MalformedResponsePolicy;
use crate::storage::{FileStorage, KeyValueStorage, KeyringStorage};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "sessionkeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Service URL used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3333";

/// Environment variable overriding `api_base_url`
pub const ENV_API_URL: &str = "SESSIONKEEP_API_URL";

/// Environment variable overriding `storage`
pub const ENV_STORAGE: &str = "SESSIONKEEP_STORAGE";

/// Environment variable overriding `malformed_response`
pub const ENV_MALFORMED_RESPONSE: &str = "SESSIONKEEP_MALFORMED_RESPONSE";

/// Where the session is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One file per key under the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
    pub malformed_response: MalformedResponsePolicy,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            storage: StorageBackend::default(),
            malformed_response: MalformedResponsePolicy::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(backend) = lookup(ENV_STORAGE) {
            self.storage = backend
                .parse::<StorageBackend>()
                .with_context(|| format!("Invalid {}", ENV_STORAGE))?;
        }
        if let Some(policy) = lookup(ENV_MALFORMED_RESPONSE) {
            self.malformed_response = policy
                .parse::<MalformedResponsePolicy>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", ENV_MALFORMED_RESPONSE))?;
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.api_base_url, self.request_timeout()).context("Failed to build HTTP client")
    }

    /// Open the configured storage backend
    pub fn open_storage(&self) -> Result<Arc<dyn KeyValueStorage>> {
        Ok(match self.storage {
            StorageBackend::File => {
                let storage = FileStorage::new(self.data_dir()?);
                debug!(dir = %storage.dir().display(), "Using file storage");
                Arc::new(storage)
            }
            StorageBackend::Keyring => {
                debug!(service = APP_NAME, "Using keychain storage");
                Arc::new(KeyringStorage::new(APP_NAME))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.malformed_response, MalformedResponsePolicy::Ignore);
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"storage":"keyring","malformed_response":"reject"}"#)
            .expect("Failed to parse config JSON");
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.malformed_response, MalformedResponsePolicy::Reject);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.last_email, None);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                ENV_API_URL => Some("https://api.example.com".to_string()),
                ENV_STORAGE => Some("Keychain".to_string()),
                ENV_MALFORMED_RESPONSE => Some("reject".to_string()),
                _ => None,
            })
            .expect("overrides apply");
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.malformed_response, MalformedResponsePolicy::Reject);
    }

    #[test]
    fn test_bad_policy_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == ENV_MALFORMED_RESPONSE).then(|| "strict".to_string()));
        assert!(result.is_err());
        assert_eq!(config.malformed_response, MalformedResponsePolicy::Ignore);
    }

    #[test]
    fn test_bad_storage_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == ENV_STORAGE).then(|| "floppy".to_string()));
        assert!(result.is_err());
        assert_eq!(config.storage, StorageBackend::File);
    }
}
