//! Reviewer directory resolver.
//!
//! Given an email address, decides whether a reviewer can be assigned
//! directly (the account exists) or has to be recruited through the
//! invitation protocol. Recruiting an existing default-role account also
//! upgrades it to reviewer, a one-way idempotent escalation.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use quorum_core::{InvitationToken, ManuscriptId, ReviewerInvitation, UserId};

use crate::error::EngineError;
use crate::notify::{dispatch, Notification};
use crate::ReviewEngine;

/// How an email address resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The account exists; assign it directly.
    AssignExisting { user_id: UserId },
    /// No account; a registration invitation was issued.
    Invited { token: InvitationToken },
}

/// 32 random bytes from the OS, hex-encoded: 256 bits of entropy.
fn generate_token() -> InvitationToken {
    use std::fmt::Write;

    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(64);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    InvitationToken(hex)
}

impl ReviewEngine {
    /// Resolve an invitee to an existing account or an open invitation.
    ///
    /// Both branches email the invitee best-effort; a delivery failure
    /// never fails the resolution.
    pub async fn resolve_or_invite(
        &self,
        email: &str,
        name: &str,
        manuscript_id: ManuscriptId,
    ) -> Result<Resolution, EngineError> {
        let manuscript = self
            .repository
            .manuscript(manuscript_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        if let Some(user) = self.directory.find_by_email(email).await? {
            // Being recruited carries the reviewer capability with it.
            self.directory.upgrade_to_reviewer(user.id).await?;
            info!(user = %user.id, manuscript = %manuscript_id, "resolved reviewer to existing account");

            dispatch(
                &*self.dispatcher,
                Notification::ReviewerAssignment {
                    recipient: user.email.clone(),
                    reviewer_name: user.name.clone(),
                    manuscript_title: manuscript.title.clone(),
                    journal: manuscript.journal.clone(),
                    due_date: None,
                },
            )
            .await;

            return Ok(Resolution::AssignExisting { user_id: user.id });
        }

        let now = Utc::now();
        if self
            .repository
            .open_invitation(email, manuscript_id, now)
            .await?
            .is_some()
        {
            return Err(EngineError::DuplicateInvitation);
        }

        let token = generate_token();
        let invitation = ReviewerInvitation::new(
            manuscript_id,
            email,
            name,
            token.clone(),
            self.config.invitation_expiry(now),
        );
        self.repository.insert_invitation(&invitation).await?;
        info!(
            invitation = %invitation.id,
            manuscript = %manuscript_id,
            token = invitation.token.preview(),
            "issued reviewer invitation"
        );

        dispatch(
            &*self.dispatcher,
            Notification::ReviewerInvitation {
                recipient: email.to_string(),
                invitee_name: name.to_string(),
                manuscript_title: manuscript.title.clone(),
                journal: manuscript.journal.clone(),
                token: token.clone(),
            },
        )
        .await;

        Ok(Resolution::Invited { token })
    }
}
