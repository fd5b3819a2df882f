//! Decision submission service.
//!
//! Reviewers act through here: open a review, submit the decision, read
//! their own assignments. Every successful decision submission ends by
//! invoking reconciliation for the manuscript; reconciliation's own guard
//! makes that safe to do unconditionally.

use chrono::Utc;
use tracing::{error, info, warn};

use quorum_core::{ManuscriptId, ReviewId, ReviewRecord, ReviewerDecision, UserId};

use crate::error::EngineError;
use crate::notify::{dispatch, Notification};
use crate::ReviewEngine;

/// Per-slot view of a manuscript's panel, for editor dashboards.
#[derive(Debug)]
pub struct PanelStatus {
    /// All records, ordered by reviewer number.
    pub reviews: Vec<ReviewRecord>,
    pub completed: usize,
    pub open: usize,
    pub all_complete: bool,
}

impl ReviewEngine {
    /// Record a reviewer's decision on their review slot.
    ///
    /// The caller must be the assigned reviewer for the record, and the
    /// record must not already be completed. After the decision is
    /// persisted, three independent best-effort side effects run in order:
    /// reviewer confirmation email, author feedback email (decision and
    /// author-facing comments only), and reconciliation.
    pub async fn submit_decision(
        &self,
        manuscript_id: ManuscriptId,
        review_id: ReviewId,
        reviewer_id: UserId,
        decision: ReviewerDecision,
        comments_to_author: String,
        comments_to_editor: Option<String>,
    ) -> Result<ReviewRecord, EngineError> {
        let mut record = self
            .repository
            .review_for_reviewer(review_id, reviewer_id)
            .await?
            .filter(|r| r.manuscript_id == manuscript_id)
            .ok_or(EngineError::NotFound)?;

        if record.is_completed() {
            return Err(EngineError::AlreadySubmitted);
        }

        let now = Utc::now();
        record.complete(decision, comments_to_author.clone(), comments_to_editor, now);
        self.repository.update_review(&record).await?;
        info!(
            review = %record.id,
            manuscript = %manuscript_id,
            slot = record.reviewer_number,
            %decision,
            "review decision recorded"
        );

        self.send_submission_emails(&record, decision, &comments_to_author)
            .await;

        // The decision is durable regardless of what reconciliation does.
        if let Err(e) = self.reconcile(manuscript_id).await {
            error!(manuscript = %manuscript_id, "reconciliation failed: {e}");
        }

        Ok(record)
    }

    /// Courtesy status update: mark a review as being worked on.
    ///
    /// Only `Pending` and `Invited` records can start; anything else is
    /// reported as `NotFound`, matching the ownership check. Submitting a
    /// decision does not require this call.
    pub async fn start_review(
        &self,
        review_id: ReviewId,
        reviewer_id: UserId,
    ) -> Result<ReviewRecord, EngineError> {
        let mut record = self
            .repository
            .review_for_reviewer(review_id, reviewer_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        if !record.start() {
            return Err(EngineError::NotFound);
        }
        self.repository.update_review(&record).await?;
        Ok(record)
    }

    /// A review record, visible only to its assigned reviewer.
    pub async fn get_review(
        &self,
        review_id: ReviewId,
        caller: UserId,
    ) -> Result<Option<ReviewRecord>, EngineError> {
        Ok(self
            .repository
            .review_for_reviewer(review_id, caller)
            .await?)
    }

    /// A reviewer's open assignments, soonest due date first.
    pub async fn assignments_for(
        &self,
        reviewer_id: UserId,
    ) -> Result<Vec<ReviewRecord>, EngineError> {
        let mut records = self.repository.reviews_for_reviewer(reviewer_id).await?;
        records.retain(|r| !r.is_completed());
        records.sort_by_key(|r| r.due_date);
        Ok(records)
    }

    /// A reviewer's completed reviews, most recent submission first.
    pub async fn completed_reviews_for(
        &self,
        reviewer_id: UserId,
    ) -> Result<Vec<ReviewRecord>, EngineError> {
        let mut records = self.repository.reviews_for_reviewer(reviewer_id).await?;
        records.retain(|r| r.is_completed());
        records.sort_by_key(|r| std::cmp::Reverse(r.submitted_at));
        Ok(records)
    }

    /// Editor view of a manuscript's panel.
    pub async fn panel_status(
        &self,
        manuscript_id: ManuscriptId,
    ) -> Result<PanelStatus, EngineError> {
        let reviews = self.repository.reviews_for_manuscript(manuscript_id).await?;
        let completed = reviews.iter().filter(|r| r.is_completed()).count();
        let open = reviews.len() - completed;
        let all_complete = !reviews.is_empty() && open == 0;
        Ok(PanelStatus {
            reviews,
            completed,
            open,
            all_complete,
        })
    }

    async fn send_submission_emails(
        &self,
        record: &ReviewRecord,
        decision: ReviewerDecision,
        comments_to_author: &str,
    ) {
        let manuscript = match self.repository.manuscript(record.manuscript_id).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                warn!(manuscript = %record.manuscript_id, "manuscript missing, skipping emails");
                return;
            }
            Err(e) => {
                warn!("manuscript lookup failed, skipping emails: {e}");
                return;
            }
        };

        match self.directory.get(record.reviewer_id).await {
            Ok(Some(reviewer)) => {
                dispatch(
                    &*self.dispatcher,
                    Notification::ReviewConfirmation {
                        recipient: reviewer.email,
                        reviewer_name: reviewer.name,
                        manuscript_title: manuscript.title.clone(),
                        journal: manuscript.journal.clone(),
                    },
                )
                .await;
            }
            Ok(None) => warn!(reviewer = %record.reviewer_id, "reviewer account missing, skipping confirmation"),
            Err(e) => warn!("reviewer lookup failed, skipping confirmation: {e}"),
        }

        match self.directory.get(manuscript.author_id).await {
            Ok(Some(author)) => {
                dispatch(
                    &*self.dispatcher,
                    Notification::AuthorDecisionFeedback {
                        recipient: author.email,
                        author_name: author.name,
                        manuscript_title: manuscript.title,
                        decision,
                        comments_to_author: comments_to_author.to_string(),
                    },
                )
                .await;
            }
            Ok(None) => warn!(author = %manuscript.author_id, "author account missing, skipping feedback"),
            Err(e) => warn!("author lookup failed, skipping feedback: {e}"),
        }
    }
}
