use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize stored value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Keychain error for key '{key}': {source}")]
    Keyring {
        key: String,
        #[source]
        source: keyring::Error,
    },

    /// A write failed and putting the previous value back failed too
    #[error("{source} (restoring the previous value also failed: {rollback})")]
    RollbackFailed {
        #[source]
        source: Box<StorageError>,
        rollback: Box<StorageError>,
    },

    #[error("Invalid storage key: '{0}'")]
    InvalidKey(String),
}
