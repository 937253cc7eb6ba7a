use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::User;

/// Snapshot of the session published to subscribers.
///
/// Every transition is published as one update, so a subscriber never sees
/// a user without the matching authorization in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionState {
    pub current_user: Option<User>,
    /// True until the startup rehydration attempt has finished
    pub is_initializing: bool,
    /// True while a sign-in, sign-up or sign-out is in flight
    pub is_busy: bool,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub established_at: Option<DateTime<Utc>>,
    /// Why rehydration failed, if it did
    pub startup_error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_user: None,
            is_initializing: true,
            is_busy: false,
            established_at: None,
            startup_error: None,
        }
    }
}
