//! Identifier newtypes.
//!
//! Each entity gets its own id type so a review id cannot be handed to an
//! API expecting a manuscript id.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Newtype for manuscript identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManuscriptId(pub Uuid);

impl ManuscriptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ManuscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ManuscriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ManuscriptId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Newtype for review-record identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub Uuid);

impl ReviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ReviewId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Newtype for user identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Newtype for reviewer-invitation identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvitationId(pub Uuid);

impl InvitationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvitationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for InvitationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Single-use registration token carried by a reviewer invitation.
///
/// No `Display` impl; log sites use [`InvitationToken::preview`] so whole
/// tokens never reach the logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvitationToken(pub String);

impl InvitationToken {
    /// Returns a truncated token for display (first 8 characters).
    pub fn preview(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl From<String> for InvitationToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InvitationToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
