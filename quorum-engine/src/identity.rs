//! Identity directory port.
//!
//! Account storage and authentication live outside the engine; this port
//! exposes the handful of lookups the review workflow needs, plus the
//! one-way reviewer-role upgrade triggered by recruitment.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use quorum_core::{Role, User, UserId};

#[derive(Debug, Error)]
#[error("identity directory failure during {operation}: {message}")]
pub struct DirectoryError {
    pub operation: String,
    pub message: String,
}

impl DirectoryError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;

    async fn get(&self, id: UserId) -> Result<Option<User>, DirectoryError>;

    /// Returns the users among `ids` that exist. Order is not guaranteed;
    /// missing ids are simply absent from the result.
    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, DirectoryError>;

    /// Idempotent one-way upgrade to the reviewer role. Accounts already
    /// holding the review capability are left untouched; unknown ids are
    /// a no-op.
    async fn upgrade_to_reviewer(&self, id: UserId) -> Result<(), DirectoryError>;

    /// Active accounts holding the review capability, for auto-assignment.
    async fn list_reviewers(&self) -> Result<Vec<User>, DirectoryError>;
}

/// In-memory directory for tests and embedding.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(users: impl IntoIterator<Item = User>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.insert(user);
        }
        directory
    }

    pub fn insert(&self, user: User) {
        self.users
            .write()
            .expect("directory lock poisoned")
            .insert(user.id, user);
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let users = self.users.read().expect("directory lock poisoned");
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        let users = self.users.read().expect("directory lock poisoned");
        Ok(users.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, DirectoryError> {
        let users = self.users.read().expect("directory lock poisoned");
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn upgrade_to_reviewer(&self, id: UserId) -> Result<(), DirectoryError> {
        let mut users = self.users.write().expect("directory lock poisoned");
        if let Some(user) = users.get_mut(&id) {
            user.promote_to_reviewer();
        }
        Ok(())
    }

    async fn list_reviewers(&self) -> Result<Vec<User>, DirectoryError> {
        let users = self.users.read().expect("directory lock poisoned");
        Ok(users
            .values()
            .filter(|u| u.active && u.role.can_review())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upgrade_is_idempotent_and_one_way() {
        let directory = InMemoryDirectory::new();
        let mut author = User::new("a@example.org", "A", Role::Author);
        let author_id = author.id;
        author.affiliation = Some("MIT".into());
        directory.insert(author);

        directory.upgrade_to_reviewer(author_id).await.unwrap();
        directory.upgrade_to_reviewer(author_id).await.unwrap();

        let user = directory.get(author_id).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Reviewer);
        // Profile data survives the upgrade.
        assert_eq!(user.affiliation.as_deref(), Some("MIT"));
    }

    #[tokio::test]
    async fn test_list_reviewers_filters_inactive_and_unprivileged() {
        let mut inactive = User::new("i@example.org", "I", Role::Reviewer);
        inactive.active = false;

        let directory = InMemoryDirectory::seeded([
            User::new("r@example.org", "R", Role::Reviewer),
            User::new("e@example.org", "E", Role::Editor),
            User::new("a@example.org", "A", Role::Author),
            inactive,
        ]);

        let reviewers = directory.list_reviewers().await.unwrap();
        let mut emails: Vec<_> = reviewers.iter().map(|u| u.email.as_str()).collect();
        emails.sort_unstable();
        assert_eq!(emails, vec!["e@example.org", "r@example.org"]);
    }

    #[tokio::test]
    async fn test_find_by_ids_skips_missing() {
        let user = User::new("r@example.org", "R", Role::Reviewer);
        let known = user.id;
        let directory = InMemoryDirectory::seeded([user]);

        let found = directory
            .find_by_ids(&[known, UserId::new()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, known);
    }
}
