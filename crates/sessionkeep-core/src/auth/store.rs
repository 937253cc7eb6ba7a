use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::User;
use crate::storage::{KeyValueStorage, StorageError};

/// Storage key holding the JSON-serialized `User`
pub const USER_KEY: &str = "user";

/// Storage key holding the raw bearer token
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user: User,
    pub token: String,
}

/// Maps a session onto two independent storage entries.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub async fn load_user(&self) -> Result<Option<User>, StorageError> {
        match self.storage.get(USER_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StorageError::Serialization {
                    key: USER_KEY.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub async fn load_token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get(TOKEN_KEY).await
    }

    /// Load the stored session. Both entries must be present; a lone user or
    /// a lone token is reported as no session.
    pub async fn load(&self) -> Result<Option<StoredSession>, StorageError> {
        let user = self.load_user().await?;
        // An empty token is no credential at all
        let token = self.load_token().await?.filter(|t| !t.is_empty());
        match (user, token) {
            (Some(user), Some(token)) => Ok(Some(StoredSession { user, token })),
            (user, token) => {
                if user.is_some() || token.is_some() {
                    debug!(has_user = user.is_some(), has_token = token.is_some(), "Ignoring partial stored session");
                }
                Ok(None)
            }
        }
    }

    /// Persist user then token. If the token write fails the previous user
    /// entry is put back, so storage holds either the new pair or whatever
    /// it held before. When that restore fails as well the error is
    /// `StorageError::RollbackFailed` and the stored pair is unknown.
    pub async fn save(&self, user: &User, token: &str) -> Result<(), StorageError> {
        let raw_user = serde_json::to_string(user).map_err(|source| StorageError::Serialization {
            key: USER_KEY.to_string(),
            source,
        })?;

        let prior_user = self.storage.get(USER_KEY).await?;
        self.storage.set(USER_KEY, &raw_user).await?;
        if let Err(e) = self.storage.set(TOKEN_KEY, token).await {
            if let Err(rollback) = self.restore(USER_KEY, prior_user.as_deref()).await {
                warn!(error = %rollback, "Failed to restore previous user entry");
                return Err(StorageError::RollbackFailed {
                    source: Box::new(e),
                    rollback: Box::new(rollback),
                });
            }
            return Err(e);
        }
        Ok(())
    }

    async fn restore(&self, key: &str, prior: Option<&str>) -> Result<(), StorageError> {
        match prior {
            Some(value) => self.storage.set(key, value).await,
            None => self.storage.remove(key).await,
        }
    }

    /// Remove both entries. Both removals are attempted; the first failure
    /// is returned.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let (user, token) = futures::future::join(
            self.storage.remove(USER_KEY),
            self.storage.remove(TOKEN_KEY),
        )
        .await;
        user.and(token)
    }
}
