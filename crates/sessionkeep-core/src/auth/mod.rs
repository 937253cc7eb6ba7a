//! Authentication module: the session manager and its collaborators.
//!
//! This module provides:
//! - `SessionManager`: sign-in, sign-out, sign-up and startup rehydration
//! - `SessionStore`: maps a session onto the `user` and `token` storage keys
//! - `AuthorizationBinder`: keeps the client's `Authorization` header in step
//!   with the current session
//! - `SessionState`: the snapshot published to subscribers
//!
//! Sessions are persisted through a `KeyValueStorage` backend and restored
//! once when the manager starts.

pub mod binder;
pub mod manager;
pub mod policy;
pub mod state;
pub mod store;

pub use binder::AuthorizationBinder;
pub use manager::SessionManager;
pub use policy::MalformedResponsePolicy;
pub use state::SessionState;
pub use store::{SessionStore, StoredSession, TOKEN_KEY, USER_KEY};
