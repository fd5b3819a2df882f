//! The panel decision rule.
//!
//! A manuscript's panel is exactly four reviewers, each with a binary
//! verdict. Publication requires a unanimous accept from the full panel;
//! a single reject resolves the manuscript as rejected. Anything short of
//! four completed reviews leaves the outcome pending. There is no majority
//! vote and no weighting.

use crate::review::{ReviewRecord, ReviewerDecision};

/// Number of reviewers on a full panel.
pub const PANEL_SIZE: usize = 4;

/// Result of evaluating a manuscript's panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fewer than [`PANEL_SIZE`] completed reviews.
    StillPending { completed: usize },
    /// All four reviewers accepted.
    Publish,
    /// At least one reviewer rejected.
    Reject { reject_count: usize },
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::StillPending { .. })
    }
}

/// Evaluates the decision rule over a manuscript's review records.
///
/// Pure function of the records; applying the outcome (status transition,
/// notifications) is the reconciliation engine's job, guarded so it fires
/// at most once.
pub fn evaluate(records: &[ReviewRecord]) -> Outcome {
    let completed: Vec<&ReviewRecord> =
        records.iter().filter(|r| r.is_completed()).collect();

    if completed.len() != PANEL_SIZE {
        return Outcome::StillPending {
            completed: completed.len(),
        };
    }

    // Reject takes priority: with all four decisions known, a full accept
    // panel is exactly the zero-reject case.
    let reject_count = completed
        .iter()
        .filter(|r| r.decision == Some(ReviewerDecision::Reject))
        .count();

    if reject_count > 0 {
        Outcome::Reject { reject_count }
    } else {
        Outcome::Publish
    }
}
