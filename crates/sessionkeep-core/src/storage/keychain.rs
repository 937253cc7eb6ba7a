use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use super::{KeyValueStorage, StorageError};

/// Default keychain service name
pub const DEFAULT_SERVICE_NAME: &str = "sessionkeep";

/// Stores each key as a separate OS keychain entry under one service name.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key).map_err(|source| StorageError::Keyring {
            key: key.to_string(),
            source,
        })
    }

    fn keyring_error(key: &str, source: keyring::Error) -> StorageError {
        StorageError::Keyring {
            key: key.to_string(),
            source,
        }
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

#[async_trait]
impl KeyValueStorage for KeyringStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!(key, "No keychain entry");
                Ok(None)
            }
            Err(e) => Err(Self::keyring_error(key, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| Self::keyring_error(key, e))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Self::keyring_error(key, e)),
        }
    }
}
