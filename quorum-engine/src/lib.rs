//! Peer-review orchestration engine for the Quorum submission portal.
//!
//! The engine drives a manuscript's lifecycle (submitted → under review →
//! published/rejected) without manual editor intervention: it assigns a
//! four-reviewer panel, records each reviewer's independent decision, and
//! reconciles the panel into a single editorial outcome exactly once.
//!
//! External concerns are injected through narrow ports:
//! - [`repository::Repository`] — persistence, including the two operations
//!   that carry the engine's atomicity requirements (panel creation and the
//!   manuscript-status compare-and-set);
//! - [`identity::IdentityDirectory`] — account lookup and the idempotent
//!   reviewer-role upgrade;
//! - [`notify::NotificationDispatcher`] — fire-and-forget email delivery.
//!
//! Everything the engine sends through the dispatcher is best-effort: a
//! failed email is logged and swallowed, never surfaced as a failure of the
//! operation that triggered it.

pub mod assignment;
pub mod autoassign;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod notify;
pub mod reconcile;
pub mod repository;
pub mod submission;

use std::sync::Arc;

pub use assignment::InviteOutcome;
pub use config::EngineConfig;
pub use directory::Resolution;
pub use error::EngineError;
pub use identity::{DirectoryError, IdentityDirectory, InMemoryDirectory};
pub use notify::{Notification, NotificationDispatcher, NotifyError, NullDispatcher, RecordingDispatcher};
pub use repository::{InMemoryRepository, PanelCreated, Repository, RepositoryError, SqliteRepository};
pub use submission::PanelStatus;

/// The orchestration engine.
///
/// One instance serves the whole portal; every operation takes the entity
/// ids it works on. Service methods live in `impl ReviewEngine` blocks in
/// their component modules ([`assignment`], [`directory`], [`submission`],
/// [`reconcile`], [`autoassign`]).
pub struct ReviewEngine {
    pub(crate) repository: Arc<dyn Repository>,
    pub(crate) directory: Arc<dyn IdentityDirectory>,
    pub(crate) dispatcher: Arc<dyn NotificationDispatcher>,
    pub(crate) config: EngineConfig,
}

impl ReviewEngine {
    pub fn new(
        repository: Arc<dyn Repository>,
        directory: Arc<dyn IdentityDirectory>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repository,
            directory,
            dispatcher,
            config,
        }
    }

    /// Engine backed by in-memory ports. Intended for tests and embedding;
    /// notifications go nowhere.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(InMemoryDirectory::new()),
            Arc::new(NullDispatcher),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
