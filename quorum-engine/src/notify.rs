//! Notification port: emails as data.
//!
//! Each [`Notification`] variant carries the template data for one kind of
//! email; the dispatcher renders and delivers them elsewhere. The engine
//! treats delivery as fire-and-forget: [`dispatch`] logs failures and
//! returns `()`, so no primary operation can fail because of email.
//!
//! Editor-only review comments are not representable here. The author
//! feedback variant carries `comments_to_author` alone, which keeps the
//! confidentiality rule a type-level fact rather than a call-site habit.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use quorum_core::{InvitationToken, ReviewerDecision};

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// All emails the engine can ask the dispatcher to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Assignment notice to a reviewer. `due_date` is `None` on the
    /// recruitment path, where the record (and its due date) does not
    /// exist yet.
    ReviewerAssignment {
        recipient: String,
        reviewer_name: String,
        manuscript_title: String,
        journal: String,
        due_date: Option<DateTime<Utc>>,
    },

    /// Registration invitation carrying the single-use token.
    ReviewerInvitation {
        recipient: String,
        invitee_name: String,
        manuscript_title: String,
        journal: String,
        token: InvitationToken,
    },

    /// Author notice that the manuscript entered review.
    ReviewCommenced {
        recipient: String,
        author_name: String,
        manuscript_title: String,
    },

    /// Confirmation to a reviewer that their decision was recorded.
    ReviewConfirmation {
        recipient: String,
        reviewer_name: String,
        manuscript_title: String,
        journal: String,
    },

    /// Per-decision feedback to the author.
    AuthorDecisionFeedback {
        recipient: String,
        author_name: String,
        manuscript_title: String,
        decision: ReviewerDecision,
        comments_to_author: String,
    },

    /// The panel accepted unanimously; the manuscript is published.
    AuthorPublication {
        recipient: String,
        author_name: String,
        manuscript_title: String,
    },

    /// The panel rejected the manuscript.
    AuthorRejection {
        recipient: String,
        author_name: String,
        manuscript_title: String,
        reject_count: usize,
    },
}

impl Notification {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReviewerAssignment { .. } => "reviewer_assignment",
            Self::ReviewerInvitation { .. } => "reviewer_invitation",
            Self::ReviewCommenced { .. } => "review_commenced",
            Self::ReviewConfirmation { .. } => "review_confirmation",
            Self::AuthorDecisionFeedback { .. } => "author_decision_feedback",
            Self::AuthorPublication { .. } => "author_publication",
            Self::AuthorRejection { .. } => "author_rejection",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Self::ReviewerAssignment { recipient, .. }
            | Self::ReviewerInvitation { recipient, .. }
            | Self::ReviewCommenced { recipient, .. }
            | Self::ReviewConfirmation { recipient, .. }
            | Self::AuthorDecisionFeedback { recipient, .. }
            | Self::AuthorPublication { recipient, .. }
            | Self::AuthorRejection { recipient, .. } => recipient,
        }
    }
}

/// Delivery port. Implementations render the variant into an email and
/// hand it to the mail infrastructure; the engine never awaits delivery
/// guarantees.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, note: &Notification) -> Result<(), NotifyError>;
}

/// Best-effort send: failures are logged at `warn` and dropped.
pub(crate) async fn dispatch(dispatcher: &dyn NotificationDispatcher, note: Notification) {
    if let Err(e) = dispatcher.send(&note).await {
        warn!(
            kind = note.kind(),
            recipient = note.recipient(),
            "failed to send notification: {e}"
        );
    }
}

/// Dispatcher that drops everything. Used where notifications are
/// irrelevant (benchmarks, some tests).
pub struct NullDispatcher;

#[async_trait]
impl NotificationDispatcher for NullDispatcher {
    async fn send(&self, _note: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Dispatcher that records every notification for later assertions.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far, in order.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }

    /// Number of sent notifications matching `kind`.
    pub fn count_of(&self, kind: &str) -> usize {
        self.sent().iter().filter(|n| n.kind() == kind).count()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, note: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(note.clone());
        Ok(())
    }
}
