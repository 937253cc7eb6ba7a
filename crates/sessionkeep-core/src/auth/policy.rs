use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What `sign_in` does when a 2xx response lacks a user or a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedResponsePolicy {
    /// Resolve without error and leave the session untouched
    #[default]
    Ignore,
    /// Fail with `SessionError::MalformedResponse`
    Reject,
}

impl fmt::Display for MalformedResponsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedResponsePolicy::Ignore => write!(f, "ignore"),
            MalformedResponsePolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for MalformedResponsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(MalformedResponsePolicy::Ignore),
            "reject" => Ok(MalformedResponsePolicy::Reject),
            other => Err(format!("unknown malformed-response policy: {}", other)),
        }
    }
}
