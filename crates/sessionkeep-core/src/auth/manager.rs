//! Session manager: owns the current session and the startup flag.
//!
//! Mutating operations (`sign_in`, `sign_up`, `sign_out` and the one-off
//! startup rehydration) run one at a time behind a fair async mutex, so
//! overlapping calls queue in arrival order. State changes are published on
//! a `watch` channel; each transition is a single update.

use std::sync::Arc;

use chrono::Utc;
use serde::de::IgnoredAny;
use tokio::sync::{watch, Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::api::client::{SIGN_IN_PATH, SIGN_UP_PATH};
use crate::api::{ApiClient, AuthResponse, SignInRequest, SignUpRequest};
use crate::error::SessionError;
use crate::models::User;
use crate::storage::{KeyValueStorage, StorageError};

use super::{AuthorizationBinder, MalformedResponsePolicy, SessionState, SessionStore};

pub struct SessionManager {
    api: ApiClient,
    binder: AuthorizationBinder,
    store: SessionStore,
    policy: MalformedResponsePolicy,
    state: watch::Sender<SessionState>,
    op_lock: Arc<Mutex<()>>,
}

/// Holds the operation lock and keeps `is_busy` set for its lifetime.
struct OperationGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    _lock: MutexGuard<'a, ()>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.is_busy = false);
    }
}

/// Clears `is_initializing` when rehydration ends, however it ends.
struct InitializationGuard<'a> {
    state: &'a watch::Sender<SessionState>,
}

impl Drop for InitializationGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| std::mem::replace(&mut s.is_initializing, false));
    }
}

impl SessionManager {
    /// Create the manager and kick off rehydration from `storage`.
    ///
    /// The returned manager reports `is_initializing() == true` until the
    /// stored session has been examined. Any operation called in the
    /// meantime waits for rehydration to finish first.
    pub async fn start(
        api: ApiClient,
        storage: Arc<dyn KeyValueStorage>,
        policy: MalformedResponsePolicy,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::default());
        let manager = Arc::new(Self {
            binder: AuthorizationBinder::new(api.clone()),
            api,
            store: SessionStore::new(storage),
            policy,
            state,
            op_lock: Arc::new(Mutex::new(())),
        });

        let lock = Arc::clone(&manager.op_lock).lock_owned().await;
        let task = Arc::clone(&manager);
        tokio::spawn(async move { task.rehydrate(lock).await });

        manager
    }

    // ===== Reactive state =====

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().current_user.clone()
    }

    pub fn is_initializing(&self) -> bool {
        self.state.borrow().is_initializing
    }

    /// Resolve once startup rehydration has finished
    pub async fn wait_until_initialized(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|s| !s.is_initializing).await;
        let snapshot = rx.borrow().clone();
        snapshot
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn binder(&self) -> &AuthorizationBinder {
        &self.binder
    }

    // ===== Operations =====

    /// Authenticate against the service and establish a session.
    ///
    /// A 2xx response missing the user or the token is handled by the
    /// configured `MalformedResponsePolicy`; with `Ignore` this resolves
    /// `Ok(())` and the session is left as it was.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let _op = self.begin_operation().await;
        self.authenticate(email, password).await
    }

    /// Create an account, then sign in with the same credentials
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<(), SessionError> {
        let _op = self.begin_operation().await;

        info!("Creating account");
        let _: IgnoredAny = self
            .api
            .post(SIGN_UP_PATH, &SignUpRequest { name, email, password })
            .await?;

        self.authenticate(email, password).await
    }

    /// End the session. The in-memory session and the authorization header
    /// are dropped first; then both stored entries are removed.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let _op = self.begin_operation().await;

        let was_signed_in = self.clear_session_state();
        self.binder.clear();
        if was_signed_in {
            info!("Signed out");
        } else {
            debug!("Sign-out with no active session");
        }

        self.store.clear().await?;
        Ok(())
    }

    // ===== Internals =====

    async fn begin_operation(&self) -> OperationGuard<'_> {
        let lock = self.op_lock.lock().await;
        self.state.send_modify(|s| s.is_busy = true);
        OperationGuard {
            state: &self.state,
            _lock: lock,
        }
    }

    /// Sign-in body, run while holding the operation lock
    async fn authenticate(&self, email: &str, password: &str) -> Result<(), SessionError> {
        info!("Signing in");
        // An empty body decodes as null and counts as a response with no fields
        let response: AuthResponse = self
            .api
            .post::<Option<AuthResponse>, _>(SIGN_IN_PATH, &SignInRequest { email, password })
            .await?
            .unwrap_or_default();

        let token = response.token.filter(|t| !t.is_empty());
        let (user, token) = match (response.user, token) {
            (Some(user), Some(token)) => (user, token),
            (user, _) => {
                let missing = if user.is_none() { "user" } else { "token" };
                return match self.policy {
                    MalformedResponsePolicy::Ignore => {
                        warn!(missing, "Sign-in response incomplete; session unchanged");
                        Ok(())
                    }
                    MalformedResponsePolicy::Reject => Err(SessionError::MalformedResponse { missing }),
                };
            }
        };

        let header = AuthorizationBinder::header_for(&token)?;
        if let Err(e) = self.store.save(&user, &token).await {
            if matches!(e, StorageError::RollbackFailed { .. }) {
                self.drop_unpersisted_session();
            }
            return Err(e.into());
        }

        self.binder.apply(header);
        self.publish_session(user);
        info!("Signed in");
        Ok(())
    }

    /// Storage no longer holds a known session; make memory agree with it.
    fn drop_unpersisted_session(&self) {
        self.clear_session_state();
        self.binder.clear();
        warn!("Stored session could not be restored; signed out in memory");
    }

    /// Publish an absent session; true if one was present
    fn clear_session_state(&self) -> bool {
        self.state.send_if_modified(|s| {
            let changed = s.current_user.is_some();
            s.current_user = None;
            s.established_at = None;
            changed
        })
    }

    fn publish_session(&self, user: User) {
        self.state.send_modify(|s| {
            s.current_user = Some(user);
            s.established_at = Some(Utc::now());
        });
    }

    async fn rehydrate(self: Arc<Self>, _lock: OwnedMutexGuard<()>) {
        let _init = InitializationGuard { state: &self.state };

        let restored = match self.store.load().await {
            Ok(Some(stored)) => self
                .binder
                .bind(&stored.token)
                .map(|()| Some(stored.user))
                .map_err(SessionError::from),
            Ok(None) => Ok(None),
            Err(e) => Err(SessionError::from(e)),
        };

        self.state.send_modify(|s| {
            match restored {
                Ok(Some(user)) => {
                    info!("Restored stored session");
                    s.current_user = Some(user);
                    s.established_at = Some(Utc::now());
                }
                Ok(None) => debug!("No stored session"),
                Err(e) => {
                    error!(error = %e, "Failed to restore stored session");
                    s.startup_error = Some(e.to_string());
                }
            }
            s.is_initializing = false;
        });
    }
}
