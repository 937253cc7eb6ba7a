use reqwest::header::{HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::api::{ApiClient, ApiError};

/// Projects the current session's token onto the shared client's default
/// `Authorization` header.
#[derive(Clone)]
pub struct AuthorizationBinder {
    client: ApiClient,
}

impl AuthorizationBinder {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Build the `Bearer <token>` header value without installing it.
    /// Fails if the token holds characters a header cannot carry.
    pub fn header_for(token: &str) -> Result<HeaderValue, ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidResponse("token is not a valid header value".to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Install a header value produced by `header_for`
    pub fn apply(&self, value: HeaderValue) {
        self.client.set_default_header(AUTHORIZATION, value);
        debug!("Authorization header bound");
    }

    pub fn bind(&self, token: &str) -> Result<(), ApiError> {
        self.apply(Self::header_for(token)?);
        Ok(())
    }

    pub fn clear(&self) {
        self.client.remove_default_header(&AUTHORIZATION);
        debug!("Authorization header cleared");
    }

    /// Current `Authorization` header value, if any
    pub fn current(&self) -> Option<String> {
        self.client.default_header(&AUTHORIZATION)
    }
}
