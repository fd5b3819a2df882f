//! Review records: one reviewer's slot on a manuscript's panel.
//!
//! Each record owns a small state machine. `Invited` applies when the
//! reviewer was recruited through the invitation protocol; `Pending` when
//! an existing account was assigned directly. A reviewer may submit a
//! decision from any non-`Completed` state — passing through `InProgress`
//! is a courtesy update, not a requirement.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ManuscriptId, ReviewId, UserId};

/// State of a single review slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Recruited via invitation; the account may be freshly registered.
    Invited,
    /// Assigned directly to an existing reviewer account.
    Pending,
    /// The reviewer has opened the review.
    InProgress,
    /// Decision submitted; the record is immutable from here.
    Completed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invited" => Some(Self::Invited),
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reviewer's binary verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerDecision {
    Accept,
    Reject,
}

impl ReviewerDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewerDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reviewer's assignment and decision state for a manuscript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewId,
    pub manuscript_id: ManuscriptId,
    pub reviewer_id: UserId,
    /// 1-based slot number, fixed at creation. Display ordering only.
    pub reviewer_number: u8,
    pub status: ReviewStatus,
    /// Non-`None` exactly when `status == Completed`.
    pub decision: Option<ReviewerDecision>,
    pub comments_to_author: Option<String>,
    pub comments_to_editor: Option<String>,
    pub due_date: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ReviewRecord {
    pub fn new(
        manuscript_id: ManuscriptId,
        reviewer_id: UserId,
        reviewer_number: u8,
        status: ReviewStatus,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            manuscript_id,
            reviewer_id,
            reviewer_number,
            status,
            decision: None,
            comments_to_author: None,
            comments_to_editor: None,
            due_date,
            submitted_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ReviewStatus::Completed
    }

    /// A review can be started from `Invited` or `Pending` only.
    pub fn can_start(&self) -> bool {
        matches!(self.status, ReviewStatus::Invited | ReviewStatus::Pending)
    }

    /// Transitions to `InProgress` if the record is in a startable state.
    /// Returns whether the transition happened.
    pub fn start(&mut self) -> bool {
        if self.can_start() {
            self.status = ReviewStatus::InProgress;
            true
        } else {
            false
        }
    }

    /// Records the decision and moves the slot to `Completed`.
    ///
    /// Decision, status, comments and timestamp move together, so the
    /// `decision.is_some() == (status == Completed)` invariant cannot be
    /// broken from outside this type.
    pub fn complete(
        &mut self,
        decision: ReviewerDecision,
        comments_to_author: String,
        comments_to_editor: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = ReviewStatus::Completed;
        self.decision = Some(decision);
        self.comments_to_author = Some(comments_to_author);
        self.comments_to_editor = comments_to_editor;
        self.submitted_at = Some(now);
    }
}
