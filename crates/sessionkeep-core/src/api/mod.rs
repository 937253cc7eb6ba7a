//! REST API client module for the remote account service.
//!
//! This module provides the `ApiClient` used for the sign-in and sign-up
//! calls. The client carries a shared default-header map so the bearer
//! token installed by the session manager rides along on every request.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthResponse, SignInRequest, SignUpRequest};
pub use error::ApiError;
