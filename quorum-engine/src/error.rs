//! Engine error taxonomy.
//!
//! A closed set of tagged kinds so callers branch on the variant, not on
//! message text. Validation errors mean the caller must fix its input;
//! state-conflict errors mean the caller's view of the world is stale.
//! Notification failures never appear here: they are logged and swallowed
//! at the call site (see [`crate::notify`]).

use thiserror::Error;

use crate::identity::DirectoryError;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing entity, or a (review, reviewer) pair that does not match an
    /// assignment; callers cannot tell the two apart.
    #[error("not found")]
    NotFound,

    /// The manuscript already has a review panel.
    #[error("reviewers already assigned to this manuscript")]
    AlreadyAssigned,

    /// The review record is already completed; decisions are final.
    #[error("review already submitted")]
    AlreadySubmitted,

    /// The proposed reviewer set fails validation before any mutation.
    #[error("invalid reviewer set: {reason}")]
    InvalidReviewerSet { reason: String },

    /// An open invitation already exists for this (email, manuscript) pair.
    #[error("an open invitation already exists for this email")]
    DuplicateInvitation,

    #[error("invitation not found")]
    InvitationNotFound,

    #[error("invitation has expired")]
    InvitationExpired,

    /// The incremental invite would exceed the configured panel cap.
    #[error("review panel is full")]
    PanelFull,

    /// Auto-assignment could not fill a panel from the reviewer pool.
    #[error("not enough eligible reviewers available")]
    NoEligibleReviewers,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl EngineError {
    /// Whether this error signals a stale caller view rather than a bug or
    /// infrastructure failure (the 4xx-equivalent class).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::AlreadyAssigned
                | Self::AlreadySubmitted
                | Self::DuplicateInvitation
                | Self::InvitationNotFound
                | Self::InvitationExpired
                | Self::PanelFull
        )
    }
}
