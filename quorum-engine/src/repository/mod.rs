//! Repository abstraction for engine persistence.
//!
//! The `Repository` trait is the engine's only window onto storage.
//! Most methods are plain CRUD; two of them carry the engine's atomicity
//! requirements and must be genuinely atomic in every implementation:
//!
//! - [`Repository::create_panel`] — the zero-existing-records guard, the
//!   insertion of all four review records, and the manuscript's move to
//!   `UnderReview` happen as a unit. A crash or race must never leave a
//!   partial panel observable.
//! - [`Repository::resolve_manuscript`] — a compare-and-set on manuscript
//!   status. When two reconciliations race on the fourth decision, the
//!   changed-row semantics decide a single winner.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use quorum_core::{
    InvitationToken, Manuscript, ManuscriptId, ManuscriptStatus, ReviewId, ReviewRecord,
    ReviewerInvitation, UserId,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage failure during {operation}: {message}")]
    Storage { operation: String, message: String },

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Result of an atomic panel-creation attempt.
#[derive(Debug)]
pub enum PanelCreated {
    /// The records were inserted and the manuscript moved to `UnderReview`.
    Created(Vec<ReviewRecord>),
    /// The manuscript already had review records; nothing was written.
    AlreadyAssigned,
}

#[async_trait]
pub trait Repository: Send + Sync {
    // =========================================================================
    // Manuscripts
    // =========================================================================

    async fn insert_manuscript(&self, manuscript: &Manuscript) -> Result<(), RepositoryError>;

    async fn manuscript(&self, id: ManuscriptId)
        -> Result<Option<Manuscript>, RepositoryError>;

    /// Compare-and-set on manuscript status.
    ///
    /// Moves the manuscript from `from` to `to` (stamping the dates when
    /// given) only if its current status is still `from`. Returns whether
    /// this call performed the transition; a `false` means another caller
    /// got there first, or the manuscript was never in `from`.
    async fn resolve_manuscript(
        &self,
        id: ManuscriptId,
        from: ManuscriptStatus,
        to: ManuscriptStatus,
        acceptance_date: Option<DateTime<Utc>>,
        publication_date: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError>;

    // =========================================================================
    // Review records
    // =========================================================================

    /// Atomically create the full review panel: verify the manuscript has
    /// no review records, insert all of `records`, and set the manuscript
    /// status to `UnderReview`.
    async fn create_panel(
        &self,
        manuscript_id: ManuscriptId,
        records: Vec<ReviewRecord>,
    ) -> Result<PanelCreated, RepositoryError>;

    /// Insert a single record (the incremental invite path).
    async fn insert_review(&self, record: &ReviewRecord) -> Result<(), RepositoryError>;

    async fn review(&self, id: ReviewId) -> Result<Option<ReviewRecord>, RepositoryError>;

    /// The record only if `reviewer_id` is its assigned reviewer.
    async fn review_for_reviewer(
        &self,
        id: ReviewId,
        reviewer_id: UserId,
    ) -> Result<Option<ReviewRecord>, RepositoryError>;

    async fn reviews_for_manuscript(
        &self,
        manuscript_id: ManuscriptId,
    ) -> Result<Vec<ReviewRecord>, RepositoryError>;

    async fn reviews_for_reviewer(
        &self,
        reviewer_id: UserId,
    ) -> Result<Vec<ReviewRecord>, RepositoryError>;

    async fn update_review(&self, record: &ReviewRecord) -> Result<(), RepositoryError>;

    /// Number of non-completed records held by a reviewer (workload).
    async fn open_review_count(&self, reviewer_id: UserId) -> Result<usize, RepositoryError>;

    // =========================================================================
    // Reviewer invitations
    // =========================================================================

    async fn insert_invitation(
        &self,
        invitation: &ReviewerInvitation,
    ) -> Result<(), RepositoryError>;

    /// The open (pending, unexpired as of `now`) invitation for the pair,
    /// if any. At most one can exist.
    async fn open_invitation(
        &self,
        email: &str,
        manuscript_id: ManuscriptId,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewerInvitation>, RepositoryError>;

    async fn invitation_by_token(
        &self,
        token: &InvitationToken,
    ) -> Result<Option<ReviewerInvitation>, RepositoryError>;

    async fn update_invitation(
        &self,
        invitation: &ReviewerInvitation,
    ) -> Result<(), RepositoryError>;
}
