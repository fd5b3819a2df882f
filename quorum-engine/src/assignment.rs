//! Review assignment service.
//!
//! Two entry paths create review records: the batch path assigns a full
//! panel of four in one atomic step, and the incremental path recruits
//! reviewers one at a time (directly or via invitation). The batch path is
//! the only way a manuscript moves to `UnderReview`.

use chrono::Utc;
use tracing::{info, warn};

use quorum_core::{
    InvitationStatus, InvitationToken, ManuscriptId, ReviewRecord, ReviewStatus, UserId,
    PANEL_SIZE,
};

use crate::error::EngineError;
use crate::notify::{dispatch, Notification};
use crate::repository::PanelCreated;
use crate::{Resolution, ReviewEngine};

/// Result of the incremental invite path.
#[derive(Debug)]
pub enum InviteOutcome {
    /// The invitee had an account; a review record was created.
    Assigned(ReviewRecord),
    /// No account yet; record creation waits for registration.
    InvitationSent { token: InvitationToken },
}

impl ReviewEngine {
    /// Assign a full review panel to a manuscript.
    ///
    /// The four ids must be distinct accounts holding the reviewer
    /// capability. Panel creation, the zero-existing-records guard, and
    /// the move to `UnderReview` are atomic in the repository; this can
    /// succeed at most once per manuscript.
    pub async fn assign(
        &self,
        manuscript_id: ManuscriptId,
        reviewer_ids: [UserId; PANEL_SIZE],
    ) -> Result<Vec<ReviewRecord>, EngineError> {
        let mut distinct = reviewer_ids.to_vec();
        distinct.sort_unstable_by_key(|id| id.0);
        distinct.dedup();
        if distinct.len() != PANEL_SIZE {
            return Err(EngineError::InvalidReviewerSet {
                reason: "reviewer ids must be distinct".to_string(),
            });
        }

        let users = self.directory.find_by_ids(&reviewer_ids).await?;
        if users.len() != PANEL_SIZE {
            return Err(EngineError::InvalidReviewerSet {
                reason: format!(
                    "only {} of {} reviewer accounts exist",
                    users.len(),
                    PANEL_SIZE
                ),
            });
        }
        if let Some(user) = users.iter().find(|u| !u.role.can_review()) {
            return Err(EngineError::InvalidReviewerSet {
                reason: format!("{} does not hold the reviewer role", user.email),
            });
        }

        let manuscript = self
            .repository
            .manuscript(manuscript_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let now = Utc::now();
        let due_date = self.config.due_date(now);
        let records: Vec<ReviewRecord> = reviewer_ids
            .iter()
            .enumerate()
            .map(|(i, reviewer_id)| {
                ReviewRecord::new(
                    manuscript_id,
                    *reviewer_id,
                    (i + 1) as u8,
                    ReviewStatus::Pending,
                    due_date,
                )
            })
            .collect();

        let records = match self.repository.create_panel(manuscript_id, records).await? {
            PanelCreated::Created(records) => records,
            PanelCreated::AlreadyAssigned => return Err(EngineError::AlreadyAssigned),
        };
        info!(manuscript = %manuscript_id, "assigned review panel, manuscript under review");

        // From here on everything is best-effort notification.
        match self.directory.get(manuscript.author_id).await {
            Ok(Some(author)) => {
                dispatch(
                    &*self.dispatcher,
                    Notification::ReviewCommenced {
                        recipient: author.email,
                        author_name: author.name,
                        manuscript_title: manuscript.title.clone(),
                    },
                )
                .await;
            }
            Ok(None) => warn!(author = %manuscript.author_id, "author account missing, skipping notice"),
            Err(e) => warn!("author lookup failed, skipping notice: {e}"),
        }

        for record in &records {
            if let Some(user) = users.iter().find(|u| u.id == record.reviewer_id) {
                dispatch(
                    &*self.dispatcher,
                    Notification::ReviewerAssignment {
                        recipient: user.email.clone(),
                        reviewer_name: user.name.clone(),
                        manuscript_title: manuscript.title.clone(),
                        journal: manuscript.journal.clone(),
                        due_date: Some(record.due_date),
                    },
                )
                .await;
            }
        }

        Ok(records)
    }

    /// Recruit a single reviewer by email.
    ///
    /// Existing accounts get a review record immediately; unknown emails
    /// get a registration invitation, and the record is created when the
    /// invitation is accepted. The configured cap bounds how many records
    /// this path can add.
    pub async fn invite(
        &self,
        manuscript_id: ManuscriptId,
        email: &str,
        name: &str,
    ) -> Result<InviteOutcome, EngineError> {
        let existing = self.repository.reviews_for_manuscript(manuscript_id).await?;
        self.check_invite_cap(existing.len())?;

        if let Some(user) = self.directory.find_by_email(email).await? {
            if existing.iter().any(|r| r.reviewer_id == user.id) {
                return Err(EngineError::AlreadyAssigned);
            }
        }

        match self.resolve_or_invite(email, name, manuscript_id).await? {
            Resolution::AssignExisting { user_id } => {
                let now = Utc::now();
                let record = ReviewRecord::new(
                    manuscript_id,
                    user_id,
                    (existing.len() + 1) as u8,
                    ReviewStatus::Invited,
                    self.config.due_date(now),
                );
                self.repository.insert_review(&record).await?;
                info!(
                    manuscript = %manuscript_id,
                    reviewer = %user_id,
                    slot = record.reviewer_number,
                    "added reviewer to panel"
                );
                Ok(InviteOutcome::Assigned(record))
            }
            Resolution::Invited { token } => Ok(InviteOutcome::InvitationSent { token }),
        }
    }

    /// Complete a deferred recruitment: the invitee registered and presents
    /// their token.
    ///
    /// Single use: a token that was already accepted (or never existed)
    /// resolves to `InvitationNotFound`; a lapsed one is marked expired and
    /// reported as such.
    pub async fn accept_invitation(
        &self,
        token: &InvitationToken,
        new_user_id: UserId,
    ) -> Result<ReviewRecord, EngineError> {
        let mut invitation = self
            .repository
            .invitation_by_token(token)
            .await?
            .ok_or(EngineError::InvitationNotFound)?;

        if invitation.status != InvitationStatus::Pending {
            return Err(EngineError::InvitationNotFound);
        }

        let now = Utc::now();
        if now >= invitation.expires_at {
            invitation.mark_expired();
            self.repository.update_invitation(&invitation).await?;
            return Err(EngineError::InvitationExpired);
        }

        let existing = self
            .repository
            .reviews_for_manuscript(invitation.manuscript_id)
            .await?;
        self.check_invite_cap(existing.len())?;

        self.directory.upgrade_to_reviewer(new_user_id).await?;

        invitation.mark_accepted();
        self.repository.update_invitation(&invitation).await?;

        let record = ReviewRecord::new(
            invitation.manuscript_id,
            new_user_id,
            (existing.len() + 1) as u8,
            ReviewStatus::Invited,
            self.config.due_date(now),
        );
        self.repository.insert_review(&record).await?;
        info!(
            manuscript = %invitation.manuscript_id,
            reviewer = %new_user_id,
            invitation = %invitation.id,
            "invitation accepted, reviewer joined panel"
        );

        Ok(record)
    }

    fn check_invite_cap(&self, existing: usize) -> Result<(), EngineError> {
        if let Some(cap) = self.config.incremental_invite_cap {
            if existing >= cap {
                return Err(EngineError::PanelFull);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quorum_core::{Manuscript, ManuscriptStatus, Role, User};

    use crate::identity::{IdentityDirectory, InMemoryDirectory};
    use crate::notify::RecordingDispatcher;
    use crate::repository::{InMemoryRepository, Repository};
    use crate::EngineConfig;

    struct Fixture {
        engine: ReviewEngine,
        dispatcher: Arc<RecordingDispatcher>,
        directory: Arc<InMemoryDirectory>,
        manuscript: Manuscript,
        reviewers: [UserId; PANEL_SIZE],
    }

    async fn fixture() -> Fixture {
        fixture_with_config(EngineConfig::default()).await
    }

    async fn fixture_with_config(config: EngineConfig) -> Fixture {
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

        let engine = ReviewEngine::new(repository, directory.clone(), dispatcher.clone(), config);
        Fixture {
            engine,
            dispatcher,
            directory,
            manuscript,
            reviewers,
        }
    }

    #[tokio::test]
    async fn test_assign_creates_numbered_panel() {
        let f = fixture().await;
        let records = f.engine.assign(f.manuscript.id, f.reviewers).await.unwrap();

        assert_eq!(records.len(), 4);
        let numbers: Vec<u8> = records.iter().map(|r| r.reviewer_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        for (record, reviewer_id) in records.iter().zip(f.reviewers) {
            assert_eq!(record.reviewer_id, reviewer_id);
            assert_eq!(record.status, ReviewStatus::Pending);
            assert!(record.decision.is_none());
        }

        let stored = f
            .engine
            .repository
            .manuscript(f.manuscript.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ManuscriptStatus::UnderReview);

        // Author learns review has begun; each reviewer gets an assignment.
        assert_eq!(f.dispatcher.count_of("review_commenced"), 1);
        assert_eq!(f.dispatcher.count_of("reviewer_assignment"), 4);
    }

    #[tokio::test]
    async fn test_assign_twice_fails_and_keeps_four_records() {
        let f = fixture().await;
        f.engine.assign(f.manuscript.id, f.reviewers).await.unwrap();

        let second = f.engine.assign(f.manuscript.id, f.reviewers).await;
        assert!(matches!(second, Err(EngineError::AlreadyAssigned)));

        let records = f
            .engine
            .repository
            .reviews_for_manuscript(f.manuscript.id)
            .await
            .unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_assign_rejects_duplicate_reviewers() {
        let f = fixture().await;
        let ids = [f.reviewers[0], f.reviewers[0], f.reviewers[1], f.reviewers[2]];

        let result = f.engine.assign(f.manuscript.id, ids).await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidReviewerSet { .. })
        ));
        // Validation failed before any mutation.
        assert!(f
            .engine
            .repository
            .reviews_for_manuscript(f.manuscript.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_assign_rejects_non_reviewer_accounts() {
        let f = fixture().await;
        let reader = User::new("reader@example.org", "Reader", Role::Reader);
        let reader_id = reader.id;
        f.directory.insert(reader);

        let ids = [f.reviewers[0], f.reviewers[1], f.reviewers[2], reader_id];
        let result = f.engine.assign(f.manuscript.id, ids).await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidReviewerSet { .. })
        ));
    }

    #[tokio::test]
    async fn test_assign_rejects_unknown_accounts() {
        let f = fixture().await;
        let ids = [f.reviewers[0], f.reviewers[1], f.reviewers[2], UserId::new()];
        let result = f.engine.assign(f.manuscript.id, ids).await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidReviewerSet { .. })
        ));
    }

    #[tokio::test]
    async fn test_invite_existing_account_joins_panel() {
        let f = fixture().await;
        let colleague = User::new("colleague@example.org", "Colleague", Role::Author);
        let colleague_id = colleague.id;
        f.directory.insert(colleague);

        let outcome = f
            .engine
            .invite(f.manuscript.id, "colleague@example.org", "Colleague")
            .await
            .unwrap();

        let InviteOutcome::Assigned(record) = outcome else {
            panic!("expected direct assignment");
        };
        assert_eq!(record.reviewer_id, colleague_id);
        assert_eq!(record.reviewer_number, 1);
        assert_eq!(record.status, ReviewStatus::Invited);

        // Recruitment upgraded the account.
        let user = f.directory.get(colleague_id).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Reviewer);
    }

    #[tokio::test]
    async fn test_invite_same_reviewer_twice_fails() {
        let f = fixture().await;
        let colleague = User::new("colleague@example.org", "Colleague", Role::Reviewer);
        f.directory.insert(colleague);

        f.engine
            .invite(f.manuscript.id, "colleague@example.org", "Colleague")
            .await
            .unwrap();
        let second = f
            .engine
            .invite(f.manuscript.id, "colleague@example.org", "Colleague")
            .await;
        assert!(matches!(second, Err(EngineError::AlreadyAssigned)));
    }

    #[tokio::test]
    async fn test_invite_cap_blocks_fifth_reviewer() {
        let f = fixture().await;
        f.engine.assign(f.manuscript.id, f.reviewers).await.unwrap();

        let fifth = User::new("fifth@example.org", "Fifth", Role::Reviewer);
        f.directory.insert(fifth);

        let result = f
            .engine
            .invite(f.manuscript.id, "fifth@example.org", "Fifth")
            .await;
        assert!(matches!(result, Err(EngineError::PanelFull)));
    }

    #[tokio::test]
    async fn test_invite_cap_can_be_disabled() {
        let config = EngineConfig {
            incremental_invite_cap: None,
            ..EngineConfig::default()
        };
        let f = fixture_with_config(config).await;
        f.engine.assign(f.manuscript.id, f.reviewers).await.unwrap();

        let fifth = User::new("fifth@example.org", "Fifth", Role::Reviewer);
        f.directory.insert(fifth);

        let outcome = f
            .engine
            .invite(f.manuscript.id, "fifth@example.org", "Fifth")
            .await
            .unwrap();
        let InviteOutcome::Assigned(record) = outcome else {
            panic!("expected direct assignment");
        };
        assert_eq!(record.reviewer_number, 5);
    }

    #[tokio::test]
    async fn test_accept_invitation_creates_deferred_record() {
        let f = fixture().await;

        let outcome = f
            .engine
            .invite(f.manuscript.id, "new@example.org", "Newcomer")
            .await
            .unwrap();
        let InviteOutcome::InvitationSent { token } = outcome else {
            panic!("expected invitation");
        };

        // The invitee registers out of band, then presents the token.
        let account = User::new("new@example.org", "Newcomer", Role::Reader);
        let account_id = account.id;
        f.directory.insert(account);

        let record = f
            .engine
            .accept_invitation(&token, account_id)
            .await
            .unwrap();
        assert_eq!(record.reviewer_id, account_id);
        assert_eq!(record.status, ReviewStatus::Invited);

        let user = f.directory.get(account_id).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Reviewer);

        // Tokens are single use.
        let replay = f.engine.accept_invitation(&token, account_id).await;
        assert!(matches!(replay, Err(EngineError::InvitationNotFound)));
    }

    #[tokio::test]
    async fn test_accept_expired_invitation_fails_and_marks_it() {
        let config = EngineConfig {
            invitation_expiry_days: 0,
            ..EngineConfig::default()
        };
        let f = fixture_with_config(config).await;

        let outcome = f
            .engine
            .invite(f.manuscript.id, "late@example.org", "Latecomer")
            .await
            .unwrap();
        let InviteOutcome::InvitationSent { token } = outcome else {
            panic!("expected invitation");
        };

        let account = User::new("late@example.org", "Latecomer", Role::Reader);
        let result = f.engine.accept_invitation(&token, account.id).await;
        assert!(matches!(result, Err(EngineError::InvitationExpired)));

        let stored = f
            .engine
            .repository
            .invitation_by_token(&token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InvitationStatus::Expired);
    }
}
