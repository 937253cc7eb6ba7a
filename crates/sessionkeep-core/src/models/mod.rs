//! Data models shared between the API client and the session manager.
//!
//! - `User`: the identity record returned by the remote service at sign-in

pub mod user;

pub use user::User;
