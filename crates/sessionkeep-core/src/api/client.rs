//! API client for the remote account service.
//!
//! `ApiClient` wraps a `reqwest::Client` plus a default-header map shared by
//! every clone of the client, so an `Authorization` header installed once is
//! sent with all subsequent requests.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::User;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the sign-in endpoint
pub const SIGN_IN_PATH: &str = "/sessions";

/// Path of the account creation endpoint
pub const SIGN_UP_PATH: &str = "/users";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SignUpRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of a successful sign-in. Either field may be missing; the session
/// manager decides what a partial response means.
#[derive(Debug, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
}

/// API client for the account service.
/// Clone is cheap and clones share both the connection pool and the
/// default headers.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    default_headers: Arc<RwLock<header::HeaderMap>>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_headers: Arc::new(RwLock::new(header::HeaderMap::new())),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay (doubled on each retry)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set a header sent with every request from this client and its clones
    pub fn set_default_header(&self, name: header::HeaderName, value: header::HeaderValue) {
        self.default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, value);
    }

    pub fn remove_default_header(&self, name: &header::HeaderName) {
        self.default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Current value of a default header, if set and valid UTF-8
    pub fn default_header(&self, name: &header::HeaderName) -> Option<String> {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn headers(&self) -> header::HeaderMap {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// POST a JSON body to `path` and decode the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            debug!(url = %url, "POST");
            let response = self
                .client
                .post(&url)
                .headers(self.headers())
                .header(header::ACCEPT, "application/json")
                .json(body)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    // An empty success body reads as JSON null
                    let text = if text.trim().is_empty() { "null" } else { text.as_str() };
                    return serde_json::from_str(text).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), Duration::from_secs(5))
            .expect("Failed to build test client")
            .with_initial_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:3333/", Duration::from_secs(1))
            .expect("Failed to build client");
        assert_eq!(client.url("/sessions"), "http://localhost:3333/sessions");
        assert_eq!(client.url("users"), "http://localhost:3333/users");
    }

    #[test]
    fn test_default_headers_shared_between_clones() {
        let client = ApiClient::new("http://localhost:3333", Duration::from_secs(1))
            .expect("Failed to build client");
        let clone = client.clone();

        clone.set_default_header(header::AUTHORIZATION, header::HeaderValue::from_static("Bearer abc"));
        assert_eq!(client.default_header(&header::AUTHORIZATION).as_deref(), Some("Bearer abc"));

        client.remove_default_header(&header::AUTHORIZATION);
        assert_eq!(clone.default_header(&header::AUTHORIZATION), None);
    }

    #[tokio::test]
    async fn test_post_sends_body_and_default_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .and(header_matcher("authorization", "Bearer t0k"))
            .and(body_json(serde_json::json!({"email": "a@b.c", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user": {"id": "1", "name": "A", "email": "a@b.c"},
                "token": "next"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_default_header(header::AUTHORIZATION, header::HeaderValue::from_static("Bearer t0k"));

        let response: AuthResponse = client
            .post(SIGN_IN_PATH, &SignInRequest { email: "a@b.c", password: "pw" })
            .await
            .expect("POST should succeed");
        assert_eq!(response.token.as_deref(), Some("next"));
        assert_eq!(response.user.map(|u| u.id).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_post_maps_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"message": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post::<AuthResponse, _>(SIGN_IN_PATH, &SignInRequest { email: "a@b.c", password: "bad" })
            .await
            .expect_err("POST should fail");
        assert!(err.is_app_error());
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_post_gives_up_after_rate_limit_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(u64::from(MAX_RATE_LIMIT_RETRIES) + 1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post::<AuthResponse, _>(SIGN_IN_PATH, &SignInRequest { email: "a@b.c", password: "pw" })
            .await
            .expect_err("POST should fail");
        assert!(matches!(err, ApiError::RateLimited));
    }

    #[tokio::test]
    async fn test_post_rejects_non_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post::<AuthResponse, _>(SIGN_IN_PATH, &SignInRequest { email: "a@b.c", password: "pw" })
            .await
            .expect_err("POST should fail");
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
