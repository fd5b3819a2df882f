//! User accounts as seen by the review engine.
//!
//! Identity lives in an external directory; the engine only cares about
//! the role ladder and the profile fields that drive reviewer selection.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Platform roles, least privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reader,
    Author,
    Reviewer,
    Editor,
    Admin,
}

impl Role {
    /// Whether accounts with this role may hold review assignments.
    pub fn can_review(&self) -> bool {
        matches!(self, Self::Reviewer | Self::Editor | Self::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Used for conflict-of-interest checks during auto-assignment.
    pub affiliation: Option<String>,
    /// Topic interests matched against manuscript keywords.
    #[serde(default)]
    pub interests: Vec<String>,
    pub active: bool,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            name: name.into(),
            role,
            affiliation: None,
            interests: Vec::new(),
            active: true,
        }
    }

    /// One-way, idempotent promotion triggered by reviewer recruitment.
    ///
    /// Only default roles are upgraded; editors and admins already hold the
    /// review capability and are left untouched. Returns whether the role
    /// actually changed.
    pub fn promote_to_reviewer(&mut self) -> bool {
        match self.role {
            Role::Reader | Role::Author => {
                self.role = Role::Reviewer;
                true
            }
            Role::Reviewer | Role::Editor | Role::Admin => false,
        }
    }
}
