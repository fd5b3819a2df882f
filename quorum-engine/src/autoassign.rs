//! Automatic reviewer selection.
//!
//! Fills a manuscript's panel from the reviewer pool without editor
//! input. Candidates are filtered for conflicts of interest (the author
//! and anyone sharing the author's affiliation), for workload, and for
//! prior involvement, then ranked by interest overlap with the
//! manuscript's keywords plus remaining workload headroom.

use tracing::info;

use quorum_core::{Manuscript, ManuscriptId, ReviewRecord, User, UserId, PANEL_SIZE};

use crate::error::EngineError;
use crate::ReviewEngine;

/// A ranked candidate produced by [`score_candidates`].
#[derive(Debug, Clone)]
pub struct Candidate {
    pub user: User,
    pub score: f64,
    pub keyword_matches: usize,
    pub open_reviews: usize,
}

/// Filter and rank candidates for a manuscript's panel.
///
/// `pool` pairs each potential reviewer with their current open-review
/// count. Excluded outright: inactive accounts, anyone sharing the
/// author's affiliation (case-insensitive, whitespace-trimmed compare),
/// and anyone at or over `max_workload`. Survivors are ordered best first.
pub fn score_candidates(
    manuscript: &Manuscript,
    author_affiliation: Option<&str>,
    pool: Vec<(User, usize)>,
    max_workload: usize,
) -> Vec<Candidate> {
    let author_affiliation = author_affiliation.map(|a| a.trim().to_lowercase());

    let mut candidates: Vec<Candidate> = pool
        .into_iter()
        .filter(|(user, open_reviews)| {
            if !user.active || *open_reviews >= max_workload {
                return false;
            }
            match (&author_affiliation, &user.affiliation) {
                (Some(author_aff), Some(user_aff)) => {
                    user_aff.trim().to_lowercase() != *author_aff
                }
                _ => true,
            }
        })
        .map(|(user, open_reviews)| {
            let keyword_matches = manuscript
                .keywords
                .iter()
                .filter(|k| {
                    user.interests
                        .iter()
                        .any(|i| i.eq_ignore_ascii_case(k.trim()))
                })
                .count();
            let headroom = (max_workload - open_reviews) as f64 * 0.5;
            Candidate {
                score: keyword_matches as f64 + headroom,
                keyword_matches,
                open_reviews,
                user,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

impl ReviewEngine {
    /// Pick the four best-matched reviewers and assign them as the panel.
    ///
    /// Fails with `NoEligibleReviewers` when the filtered pool cannot fill
    /// a panel; otherwise delegates to [`ReviewEngine::assign`], so all of
    /// the batch path's invariants (one panel per manuscript, atomic
    /// creation, notifications) apply.
    pub async fn auto_assign(
        &self,
        manuscript_id: ManuscriptId,
    ) -> Result<Vec<ReviewRecord>, EngineError> {
        let manuscript = self
            .repository
            .manuscript(manuscript_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let existing = self.repository.reviews_for_manuscript(manuscript_id).await?;
        let author = self.directory.get(manuscript.author_id).await?;
        let reviewers = self.directory.list_reviewers().await?;

        let mut pool = Vec::with_capacity(reviewers.len());
        for user in reviewers {
            if user.id == manuscript.author_id {
                continue;
            }
            if existing.iter().any(|r| r.reviewer_id == user.id) {
                continue;
            }
            let open_reviews = self.repository.open_review_count(user.id).await?;
            pool.push((user, open_reviews));
        }

        let ranked = score_candidates(
            &manuscript,
            author.as_ref().and_then(|a| a.affiliation.as_deref()),
            pool,
            self.config.max_reviewer_workload,
        );
        if ranked.len() < PANEL_SIZE {
            return Err(EngineError::NoEligibleReviewers);
        }

        let mut chosen = [UserId::default(); PANEL_SIZE];
        for (slot, candidate) in chosen.iter_mut().zip(ranked.iter()) {
            *slot = candidate.user.id;
        }
        info!(
            manuscript = %manuscript_id,
            top_score = ranked[0].score,
            "auto-selected review panel"
        );

        self.assign(manuscript_id, chosen).await
    }
}
