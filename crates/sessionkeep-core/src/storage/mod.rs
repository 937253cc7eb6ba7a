//! Durable key-value storage backends.
//!
//! The session store only needs three operations keyed by string, so any
//! backend that can `get`, `set` and `remove` an opaque string value can
//! hold a session:
//!
//! - `FileStorage`: one file per key under the app's data directory
//! - `KeyringStorage`: OS keychain entries via `keyring`
//! - `MemoryStorage`: process-local map, for tests and throwaway sessions

pub mod error;
pub mod file;
pub mod keychain;
pub mod memory;

use async_trait::async_trait;

pub use self::error::StorageError;
pub use self::file::FileStorage;
pub use self::keychain::KeyringStorage;
pub use self::memory::MemoryStorage;

/// Durable string key-value store. Values survive process restarts for every
/// backend except `MemoryStorage`.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
