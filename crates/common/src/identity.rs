//! Request identity: authenticated user or anonymous guest session.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Opaque guest session identifier issued by the gateway for
/// unauthenticated checkout flows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the session ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The identity attached to an inbound request.
///
/// Authentication itself happens upstream; this crate only carries the
/// result so cart lookups can be scoped to the right owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// An authenticated user.
    User(UserId),
    /// An anonymous guest session.
    Guest(SessionId),
}

impl Identity {
    /// Returns the user ID if this identity is an authenticated user.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::User(id) => Some(*id),
            Identity::Guest(_) => None,
        }
    }

    /// Returns true if this identity is a guest session.
    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest(_))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{id}"),
            Identity::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}
