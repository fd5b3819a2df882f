//! Decision reconciliation.
//!
//! Invoked after every decision submission. Reads the manuscript's panel,
//! evaluates the decision rule, and applies a resolved outcome exactly
//! once. The only mutual-exclusion boundary in the engine sits here: the
//! manuscript-status change goes through the repository's compare-and-set,
//! so of any number of concurrent reconciliations observing a full panel,
//! exactly one performs the transition and notifies the author. Losers and
//! repeat calls see a failed compare-and-set and finish as no-ops.

use chrono::Utc;
use tracing::{debug, info};

use quorum_core::{evaluate, ManuscriptId, ManuscriptStatus, Outcome};

use crate::error::EngineError;
use crate::notify::{dispatch, Notification};
use crate::ReviewEngine;

impl ReviewEngine {
    /// Compute and, on the transition edge, apply the editorial outcome
    /// for a manuscript.
    ///
    /// Safe to call redundantly or concurrently: the returned outcome
    /// reflects the panel, while the status change and author notification
    /// fire only for the single winning call.
    pub async fn reconcile(&self, manuscript_id: ManuscriptId) -> Result<Outcome, EngineError> {
        let records = self.repository.reviews_for_manuscript(manuscript_id).await?;
        let outcome = evaluate(&records);

        match outcome {
            Outcome::StillPending { completed } => {
                debug!(
                    manuscript = %manuscript_id,
                    completed,
                    "panel incomplete, no outcome yet"
                );
            }
            Outcome::Publish => {
                let now = Utc::now();
                let won = self
                    .repository
                    .resolve_manuscript(
                        manuscript_id,
                        ManuscriptStatus::UnderReview,
                        ManuscriptStatus::Published,
                        Some(now),
                        Some(now),
                    )
                    .await?;
                if won {
                    info!(manuscript = %manuscript_id, "panel unanimous, manuscript published");
                    self.notify_author(manuscript_id, outcome).await;
                } else {
                    debug!(manuscript = %manuscript_id, "already resolved, nothing to do");
                }
            }
            Outcome::Reject { reject_count } => {
                let won = self
                    .repository
                    .resolve_manuscript(
                        manuscript_id,
                        ManuscriptStatus::UnderReview,
                        ManuscriptStatus::Rejected,
                        None,
                        None,
                    )
                    .await?;
                if won {
                    info!(
                        manuscript = %manuscript_id,
                        reject_count,
                        "panel rejected manuscript"
                    );
                    self.notify_author(manuscript_id, outcome).await;
                } else {
                    debug!(manuscript = %manuscript_id, "already resolved, nothing to do");
                }
            }
        }

        Ok(outcome)
    }

    /// Author notification for a freshly applied outcome. Only the winner
    /// of the compare-and-set gets here.
    async fn notify_author(&self, manuscript_id: ManuscriptId, outcome: Outcome) {
        let Ok(Some(manuscript)) = self.repository.manuscript(manuscript_id).await else {
            return;
        };
        let Ok(Some(author)) = self.directory.get(manuscript.author_id).await else {
            return;
        };

        let note = match outcome {
            Outcome::Publish => Notification::AuthorPublication {
                recipient: author.email,
                author_name: author.name,
                manuscript_title: manuscript.title,
            },
            Outcome::Reject { reject_count } => Notification::AuthorRejection {
                recipient: author.email,
                author_name: author.name,
                manuscript_title: manuscript.title,
                reject_count,
            },
            Outcome::StillPending { .. } => return,
        };
        dispatch(&*self.dispatcher, note).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quorum_core::{
        Manuscript, ReviewRecord, ReviewerDecision, Role, User, UserId, PANEL_SIZE,
    };

    use crate::identity::InMemoryDirectory;
    use crate::notify::RecordingDispatcher;
    use crate::repository::{InMemoryRepository, Repository};
    use crate::EngineConfig;

    struct Fixture {
        engine: ReviewEngine,
        dispatcher: Arc<RecordingDispatcher>,
        manuscript: Manuscript,
        records: Vec<ReviewRecord>,
    }

    async fn assigned_fixture() -> Fixture {
        let repository = Arc::new(InMemoryRepository::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());

        let author = User::new("author@example.org", "Author", Role::Author);
        let manuscript = Manuscript::new("Fixture Paper", author.id, "IJAISM");
        repository.insert_manuscript(&manuscript).await.unwrap();
        directory.insert(author);

        let mut reviewers = [UserId::new(); PANEL_SIZE];
        for (i, slot) in reviewers.iter_mut().enumerate() {
            let user = User::new(
                format!("reviewer{i}@example.org"),
                format!("Reviewer {i}"),
                Role::Reviewer,
            );
            *slot = user.id;
            directory.insert(user);
        }

        let engine = ReviewEngine::new(
            repository,
            directory,
            dispatcher.clone(),
            EngineConfig::default(),
        );
        let records = engine.assign(manuscript.id, reviewers).await.unwrap();
        Fixture {
            engine,
            dispatcher,
            manuscript,
            records,
        }
    }

    async fn submit(f: &Fixture, slot: usize, decision: ReviewerDecision) {
        let record = &f.records[slot];
        f.engine
            .submit_decision(
                f.manuscript.id,
                record.id,
                record.reviewer_id,
                decision,
                format!("Decision from slot {}.", record.reviewer_number),
                None,
            )
            .await
            .unwrap();
    }

    async fn stored_status(f: &Fixture) -> ManuscriptStatus {
        f.engine
            .repository
            .manuscript(f.manuscript.id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_unanimous_accept_publishes_with_dates() {
        let f = assigned_fixture().await;
        for slot in 0..4 {
            submit(&f, slot, ReviewerDecision::Accept).await;
        }

        assert_eq!(stored_status(&f).await, ManuscriptStatus::Published);
        let manuscript = f
            .engine
            .repository
            .manuscript(f.manuscript.id)
            .await
            .unwrap()
            .unwrap();
        assert!(manuscript.acceptance_date.is_some());
        assert!(manuscript.publication_date.is_some());
        assert_eq!(f.dispatcher.count_of("author_publication"), 1);
        assert_eq!(f.dispatcher.count_of("author_rejection"), 0);
    }

    #[tokio::test]
    async fn test_one_reject_rejects_regardless_of_order() {
        let f = assigned_fixture().await;
        submit(&f, 0, ReviewerDecision::Accept).await;
        submit(&f, 1, ReviewerDecision::Accept).await;
        submit(&f, 2, ReviewerDecision::Reject).await;
        submit(&f, 3, ReviewerDecision::Accept).await;

        assert_eq!(stored_status(&f).await, ManuscriptStatus::Rejected);
        // No publication dates on a rejection.
        let manuscript = f
            .engine
            .repository
            .manuscript(f.manuscript.id)
            .await
            .unwrap()
            .unwrap();
        assert!(manuscript.acceptance_date.is_none());
        assert!(manuscript.publication_date.is_none());
        assert_eq!(f.dispatcher.count_of("author_rejection"), 1);
    }

    #[tokio::test]
    async fn test_unanimous_reject_reports_count() {
        let f = assigned_fixture().await;
        for slot in 0..4 {
            submit(&f, slot, ReviewerDecision::Reject).await;
        }

        assert_eq!(stored_status(&f).await, ManuscriptStatus::Rejected);
        let rejections: Vec<Notification> = f
            .dispatcher
            .sent()
            .into_iter()
            .filter(|n| n.kind() == "author_rejection")
            .collect();
        assert_eq!(rejections.len(), 1);
        let Notification::AuthorRejection { reject_count, .. } = &rejections[0] else {
            panic!("expected rejection notice");
        };
        assert_eq!(*reject_count, 4);
    }

    #[tokio::test]
    async fn test_three_decisions_leave_manuscript_under_review() {
        let f = assigned_fixture().await;
        for slot in 0..3 {
            submit(&f, slot, ReviewerDecision::Accept).await;
        }

        assert_eq!(stored_status(&f).await, ManuscriptStatus::UnderReview);

        // An explicit reconcile is a no-op too.
        let outcome = f.engine.reconcile(f.manuscript.id).await.unwrap();
        assert_eq!(outcome, Outcome::StillPending { completed: 3 });
        assert_eq!(f.dispatcher.count_of("author_publication"), 0);
        assert_eq!(f.dispatcher.count_of("author_rejection"), 0);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_after_resolution() {
        let f = assigned_fixture().await;
        for slot in 0..4 {
            submit(&f, slot, ReviewerDecision::Accept).await;
        }

        let manuscript_after_first = f
            .engine
            .repository
            .manuscript(f.manuscript.id)
            .await
            .unwrap()
            .unwrap();

        // Call reconcile twice more on identical state.
        let second = f.engine.reconcile(f.manuscript.id).await.unwrap();
        let third = f.engine.reconcile(f.manuscript.id).await.unwrap();
        assert_eq!(second, Outcome::Publish);
        assert_eq!(third, Outcome::Publish);

        // One notification total, dates untouched.
        assert_eq!(f.dispatcher.count_of("author_publication"), 1);
        let manuscript_after_third = f
            .engine
            .repository
            .manuscript(f.manuscript.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            manuscript_after_third.acceptance_date,
            manuscript_after_first.acceptance_date
        );
        assert_eq!(
            manuscript_after_third.publication_date,
            manuscript_after_first.publication_date
        );
    }
}
