use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Errors surfaced by session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The remote service rejected the call or could not be reached
    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error("Session storage failed: {0}")]
    Storage(#[from] StorageError),

    /// Sign-in succeeded at the HTTP level but the body lacked a user or token
    #[error("Sign-in response is missing {missing}")]
    MalformedResponse { missing: &'static str },
}

impl SessionError {
    /// Text suitable for a toast or alert: the service's own message for
    /// application errors, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            SessionError::Remote(e) => e.user_message(fallback),
            _ => fallback.to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SessionError::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_keeps_server_message() {
        let err = SessionError::from(ApiError::App {
            status: 400,
            message: "Invalid credentials".to_string(),
        });
        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(err.user_message("Could not sign in"), "Invalid credentials");
        assert!(err.is_remote());
    }

    #[test]
    fn test_non_app_errors_use_fallback() {
        let err = SessionError::MalformedResponse { missing: "token" };
        assert_eq!(err.user_message("Could not sign in"), "Could not sign in");

        let err = SessionError::from(ApiError::Unauthorized);
        assert_eq!(err.user_message("Could not sign in"), "Could not sign in");
    }
}
