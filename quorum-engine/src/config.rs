//! Engine configuration.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use quorum_core::PANEL_SIZE;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Days a reviewer has from assignment to due date.
    pub review_due_days: i64,
    /// Days before a reviewer invitation token lapses.
    pub invitation_expiry_days: i64,
    /// Cap on the number of review records reachable through the
    /// one-at-a-time invite path. `None` disables the cap and lets
    /// editors over-invite.
    pub incremental_invite_cap: Option<usize>,
    /// Maximum open reviews a candidate may hold and still be eligible for
    /// auto-assignment.
    pub max_reviewer_workload: usize,
    /// SQLite database path; `None` selects the in-memory repository.
    pub db_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            review_due_days: 14,
            invitation_expiry_days: 7,
            incremental_invite_cap: Some(PANEL_SIZE),
            max_reviewer_workload: 5,
            db_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = env::var("QUORUM_REVIEW_DUE_DAYS") {
            config.review_due_days = v
                .parse::<i64>()
                .context("QUORUM_REVIEW_DUE_DAYS must be a number of days")?;
        }

        if let Ok(v) = env::var("QUORUM_INVITATION_EXPIRY_DAYS") {
            config.invitation_expiry_days = v
                .parse::<i64>()
                .context("QUORUM_INVITATION_EXPIRY_DAYS must be a number of days")?;
        }

        config.incremental_invite_cap = parse_invite_cap(env::var("QUORUM_INVITE_CAP").ok())?;

        if let Ok(v) = env::var("QUORUM_MAX_REVIEWER_WORKLOAD") {
            config.max_reviewer_workload = v
                .parse::<usize>()
                .context("QUORUM_MAX_REVIEWER_WORKLOAD must be a number")?;
        }

        config.db_path = env::var("QUORUM_STATE_DB").map(PathBuf::from).ok();

        Ok(config)
    }

    pub fn due_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.review_due_days)
    }

    pub fn invitation_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.invitation_expiry_days)
    }
}

/// Parse `QUORUM_INVITE_CAP` from an optional string value.
///
/// Missing means the default cap (the panel size); the literal `"none"`
/// disables the cap entirely.
pub fn parse_invite_cap(value: Option<String>) -> Result<Option<usize>> {
    match value {
        None => Ok(Some(PANEL_SIZE)),
        Some(v) if v.eq_ignore_ascii_case("none") => Ok(None),
        Some(v) => Ok(Some(v.parse::<usize>().context(
            "QUORUM_INVITE_CAP must be a number or \"none\"",
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.review_due_days, 14);
        assert_eq!(config.invitation_expiry_days, 7);
        assert_eq!(config.incremental_invite_cap, Some(PANEL_SIZE));
    }

    #[test]
    fn test_parse_invite_cap_missing_uses_panel_size() {
        assert_eq!(parse_invite_cap(None).unwrap(), Some(PANEL_SIZE));
    }

    #[test]
    fn test_parse_invite_cap_none_disables() {
        assert_eq!(parse_invite_cap(Some("none".to_string())).unwrap(), None);
        assert_eq!(parse_invite_cap(Some("NONE".to_string())).unwrap(), None);
    }

    #[test]
    fn test_parse_invite_cap_number() {
        assert_eq!(parse_invite_cap(Some("6".to_string())).unwrap(), Some(6));
    }

    #[test]
    fn test_parse_invite_cap_garbage_is_an_error() {
        assert!(parse_invite_cap(Some("four".to_string())).is_err());
    }

    #[test]
    fn test_due_date_horizon() {
        let config = EngineConfig::default();
        let now = Utc::now();
        assert_eq!(config.due_date(now) - now, Duration::days(14));
        assert_eq!(config.invitation_expiry(now) - now, Duration::days(7));
    }
}
