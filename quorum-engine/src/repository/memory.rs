//! In-memory implementation of [`Repository`].
//!
//! All three entity maps sit behind one `RwLock`, so the two compound
//! operations (`create_panel`, `resolve_manuscript`) are atomic by holding
//! the single write guard across their check and their writes. State is
//! lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use quorum_core::{
    InvitationId, InvitationToken, Manuscript, ManuscriptId, ManuscriptStatus, ReviewId,
    ReviewRecord, ReviewerInvitation, UserId,
};

use super::{PanelCreated, Repository, RepositoryError};

#[derive(Default)]
struct Tables {
    manuscripts: HashMap<ManuscriptId, Manuscript>,
    reviews: HashMap<ReviewId, ReviewRecord>,
    invitations: HashMap<InvitationId, ReviewerInvitation>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert_manuscript(&self, manuscript: &Manuscript) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.manuscripts.insert(manuscript.id, manuscript.clone());
        Ok(())
    }

    async fn manuscript(
        &self,
        id: ManuscriptId,
    ) -> Result<Option<Manuscript>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.manuscripts.get(&id).cloned())
    }

    async fn resolve_manuscript(
        &self,
        id: ManuscriptId,
        from: ManuscriptStatus,
        to: ManuscriptStatus,
        acceptance_date: Option<DateTime<Utc>>,
        publication_date: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(manuscript) = tables.manuscripts.get_mut(&id) else {
            return Ok(false);
        };
        if manuscript.status != from {
            return Ok(false);
        }
        manuscript.status = to;
        if acceptance_date.is_some() {
            manuscript.acceptance_date = acceptance_date;
        }
        if publication_date.is_some() {
            manuscript.publication_date = publication_date;
        }
        Ok(true)
    }

    async fn create_panel(
        &self,
        manuscript_id: ManuscriptId,
        records: Vec<ReviewRecord>,
    ) -> Result<PanelCreated, RepositoryError> {
        let mut tables = self.tables.write().await;

        if tables
            .reviews
            .values()
            .any(|r| r.manuscript_id == manuscript_id)
        {
            return Ok(PanelCreated::AlreadyAssigned);
        }

        let Some(manuscript) = tables.manuscripts.get_mut(&manuscript_id) else {
            return Err(RepositoryError::storage(
                "create_panel",
                format!("manuscript {manuscript_id} not found"),
            ));
        };
        manuscript.status = ManuscriptStatus::UnderReview;

        for record in &records {
            tables.reviews.insert(record.id, record.clone());
        }

        Ok(PanelCreated::Created(records))
    }

    async fn insert_review(&self, record: &ReviewRecord) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.reviews.insert(record.id, record.clone());
        Ok(())
    }

    async fn review(&self, id: ReviewId) -> Result<Option<ReviewRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.reviews.get(&id).cloned())
    }

    async fn review_for_reviewer(
        &self,
        id: ReviewId,
        reviewer_id: UserId,
    ) -> Result<Option<ReviewRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .get(&id)
            .filter(|r| r.reviewer_id == reviewer_id)
            .cloned())
    }

    async fn reviews_for_manuscript(
        &self,
        manuscript_id: ManuscriptId,
    ) -> Result<Vec<ReviewRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut records: Vec<ReviewRecord> = tables
            .reviews
            .values()
            .filter(|r| r.manuscript_id == manuscript_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.reviewer_number);
        Ok(records)
    }

    async fn reviews_for_reviewer(
        &self,
        reviewer_id: UserId,
    ) -> Result<Vec<ReviewRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .values()
            .filter(|r| r.reviewer_id == reviewer_id)
            .cloned()
            .collect())
    }

    async fn update_review(&self, record: &ReviewRecord) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.reviews.contains_key(&record.id) {
            return Err(RepositoryError::storage(
                "update_review",
                format!("review {} not found", record.id),
            ));
        }
        tables.reviews.insert(record.id, record.clone());
        Ok(())
    }

    async fn open_review_count(&self, reviewer_id: UserId) -> Result<usize, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .values()
            .filter(|r| r.reviewer_id == reviewer_id && !r.is_completed())
            .count())
    }

    async fn insert_invitation(
        &self,
        invitation: &ReviewerInvitation,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn open_invitation(
        &self,
        email: &str,
        manuscript_id: ManuscriptId,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewerInvitation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .invitations
            .values()
            .find(|i| i.email == email && i.manuscript_id == manuscript_id && i.is_open(now))
            .cloned())
    }

    async fn invitation_by_token(
        &self,
        token: &InvitationToken,
    ) -> Result<Option<ReviewerInvitation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .invitations
            .values()
            .find(|i| &i.token == token)
            .cloned())
    }

    async fn update_invitation(
        &self,
        invitation: &ReviewerInvitation,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.invitations.contains_key(&invitation.id) {
            return Err(RepositoryError::storage(
                "update_invitation",
                format!("invitation {} not found", invitation.id),
            ));
        }
        tables.invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quorum_core::{ReviewStatus, UserId};

    fn manuscript() -> Manuscript {
        Manuscript::new("Test Manuscript", UserId::new(), "IJAISM")
    }

    fn panel_records(manuscript_id: ManuscriptId) -> Vec<ReviewRecord> {
        (1..=4u8)
            .map(|n| {
                ReviewRecord::new(
                    manuscript_id,
                    UserId::new(),
                    n,
                    ReviewStatus::Pending,
                    Utc::now() + Duration::days(14),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_panel_once() {
        let repo = InMemoryRepository::new();
        let m = manuscript();
        repo.insert_manuscript(&m).await.unwrap();

        let created = repo.create_panel(m.id, panel_records(m.id)).await.unwrap();
        assert!(matches!(created, PanelCreated::Created(ref r) if r.len() == 4));

        let stored = repo.manuscript(m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ManuscriptStatus::UnderReview);

        // Second attempt is rejected and writes nothing.
        let again = repo.create_panel(m.id, panel_records(m.id)).await.unwrap();
        assert!(matches!(again, PanelCreated::AlreadyAssigned));
        assert_eq!(repo.reviews_for_manuscript(m.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_resolve_manuscript_single_winner() {
        let repo = InMemoryRepository::new();
        let m = manuscript();
        repo.insert_manuscript(&m).await.unwrap();
        repo.create_panel(m.id, panel_records(m.id)).await.unwrap();

        let now = Utc::now();
        let first = repo
            .resolve_manuscript(
                m.id,
                ManuscriptStatus::UnderReview,
                ManuscriptStatus::Published,
                Some(now),
                Some(now),
            )
            .await
            .unwrap();
        assert!(first);

        let second = repo
            .resolve_manuscript(
                m.id,
                ManuscriptStatus::UnderReview,
                ManuscriptStatus::Published,
                Some(Utc::now()),
                Some(Utc::now()),
            )
            .await
            .unwrap();
        assert!(!second);

        let stored = repo.manuscript(m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ManuscriptStatus::Published);
        // Dates stamped by the winning call only.
        assert_eq!(stored.acceptance_date, Some(now));
        assert_eq!(stored.publication_date, Some(now));
    }

    #[tokio::test]
    async fn test_review_for_reviewer_enforces_ownership() {
        let repo = InMemoryRepository::new();
        let m = manuscript();
        repo.insert_manuscript(&m).await.unwrap();
        let records = panel_records(m.id);
        let record = records[0].clone();
        repo.create_panel(m.id, records).await.unwrap();

        let owner = repo
            .review_for_reviewer(record.id, record.reviewer_id)
            .await
            .unwrap();
        assert!(owner.is_some());

        let stranger = repo
            .review_for_reviewer(record.id, UserId::new())
            .await
            .unwrap();
        assert!(stranger.is_none());
    }

    #[tokio::test]
    async fn test_open_invitation_respects_expiry() {
        let repo = InMemoryRepository::new();
        let manuscript_id = ManuscriptId::new();

        let expired = ReviewerInvitation::new(
            manuscript_id,
            "ada@example.org",
            "Ada",
            InvitationToken::from("a".repeat(64)),
            Utc::now() - Duration::hours(1),
        );
        repo.insert_invitation(&expired).await.unwrap();

        let open = repo
            .open_invitation("ada@example.org", manuscript_id, Utc::now())
            .await
            .unwrap();
        assert!(open.is_none());

        // A token lookup still finds it; acceptance handles expiry itself.
        let by_token = repo.invitation_by_token(&expired.token).await.unwrap();
        assert!(by_token.is_some());
    }
}
