//! Reviewer invitations.
//!
//! When an editor recruits a reviewer who has no account yet, the engine
//! issues a single-use token with a seven-day expiry. At most one open
//! invitation may exist per (email, manuscript) pair.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{InvitationId, InvitationToken, ManuscriptId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A token-based recruitment record for a reviewer without an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerInvitation {
    pub id: InvitationId,
    pub manuscript_id: ManuscriptId,
    pub email: String,
    pub name: String,
    pub token: InvitationToken,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReviewerInvitation {
    pub fn new(
        manuscript_id: ManuscriptId,
        email: impl Into<String>,
        name: impl Into<String>,
        token: InvitationToken,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvitationId::new(),
            manuscript_id,
            email: email.into(),
            name: name.into(),
            token,
            status: InvitationStatus::Pending,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Still pending and not past its expiry.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && now < self.expires_at
    }

    pub fn mark_accepted(&mut self) {
        self.status = InvitationStatus::Accepted;
    }

    pub fn mark_expired(&mut self) {
        self.status = InvitationStatus::Expired;
    }
}
