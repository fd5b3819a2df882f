//! Manuscript entity and its lifecycle states.
//!
//! A manuscript is born `Submitted`, moves to `UnderReview` exactly once
//! when a panel is assigned, and is resolved to `Published` or `Rejected`
//! exactly once by reconciliation. Both resolved states are terminal as far
//! as the review engine is concerned.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ManuscriptId, UserId};

/// Lifecycle status of a manuscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManuscriptStatus {
    /// Submitted by the author, no panel assigned yet.
    Submitted,
    /// A review panel has been assigned.
    UnderReview,
    /// All four reviewers accepted; live on the journal.
    Published,
    /// At least one reviewer rejected.
    Rejected,
    /// In press: accepted and handed to publication scheduling.
    /// Set by downstream tooling, never by the review engine.
    Accepted,
}

impl ManuscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Published => "published",
            Self::Rejected => "rejected",
            Self::Accepted => "accepted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "under_review" => Some(Self::UnderReview),
            "published" => Some(Self::Published),
            "rejected" => Some(Self::Rejected),
            "accepted" => Some(Self::Accepted),
            _ => None,
        }
    }

    /// Terminal from the review engine's point of view.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Published | Self::Rejected)
    }
}

impl fmt::Display for ManuscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A submitted article undergoing the review lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manuscript {
    pub id: ManuscriptId,
    pub title: String,
    pub author_id: UserId,
    /// Journal code, e.g. "IJAISM". Opaque to the engine.
    pub journal: String,
    /// Used by auto-assignment to match reviewer interests.
    #[serde(default)]
    pub keywords: Vec<String>,
    pub status: ManuscriptStatus,
    pub submitted_at: DateTime<Utc>,
    /// Set only by reconciliation on the publish transition.
    pub acceptance_date: Option<DateTime<Utc>>,
    /// Set only by reconciliation on the publish transition.
    pub publication_date: Option<DateTime<Utc>>,
}

impl Manuscript {
    pub fn new(
        title: impl Into<String>,
        author_id: UserId,
        journal: impl Into<String>,
    ) -> Self {
        Self {
            id: ManuscriptId::new(),
            title: title.into(),
            author_id,
            journal: journal.into(),
            keywords: Vec::new(),
            status: ManuscriptStatus::Submitted,
            submitted_at: Utc::now(),
            acceptance_date: None,
            publication_date: None,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}
