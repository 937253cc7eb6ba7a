//! sessionkeep core library.
//!
//! Owns a mobile client's sign-in session: authenticating against the
//! account service, persisting the user and bearer token, restoring them on
//! start, and keeping the shared HTTP client's `Authorization` header in
//! step with the session.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{MalformedResponsePolicy, SessionManager, SessionState};
pub use config::Config;
pub use error::SessionError;
pub use models::User;
pub use storage::{KeyValueStorage, StorageError};
