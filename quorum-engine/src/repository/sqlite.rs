//! SQLite implementation of [`Repository`].
//!
//! Persistent storage that survives service restarts. Entities are stored
//! as JSON bodies next to the columns the engine queries or guards on
//! (statuses, foreign ids, invitation tokens). The guarded columns are
//! what make the two compound operations atomic:
//!
//! - `create_panel` runs its existence check, inserts, and the manuscript
//!   status change inside one transaction;
//! - `resolve_manuscript` is a conditional `UPDATE ... WHERE status = ?`
//!   whose changed-row count picks the single winner.
//!
//! # Schema versioning
//!
//! A `schema_version` table tracks the schema. To change the schema,
//! increment `CURRENT_SCHEMA_VERSION` and add a step to `run_migrations`;
//! migrations run sequentially from the stored version to the target.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use quorum_core::{
    InvitationToken, Manuscript, ManuscriptId, ManuscriptStatus, ReviewId, ReviewRecord,
    ReviewerInvitation, UserId,
};

use super::{PanelCreated, Repository, RepositoryError};

/// Current schema version. Increment when making schema changes and add
/// corresponding migration logic in `run_migrations`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed repository.
///
/// Synchronous rusqlite calls run under `tokio::task::spawn_blocking` so
/// they never stall the async runtime.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

fn store_err(operation: &'static str) -> impl Fn(rusqlite::Error) -> RepositoryError {
    move |e| RepositoryError::storage(operation, e.to_string())
}

impl SqliteRepository {
    /// Create a repository at the given path (`":memory:"` for ephemeral).
    ///
    /// Creates the database file and schema if they don't exist and runs
    /// any pending migrations. The database is configured with
    /// `journal_mode = WAL`, `synchronous = FULL` and a 5s busy timeout.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref).map_err(store_err("open database"))?;

        // WAL must actually take effect: SQLite silently keeps DELETE mode
        // on filesystems without shared-memory support, which would void
        // the concurrency guarantees. In-memory databases report "memory".
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(store_err("set journal_mode"))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!("expected 'wal', SQLite returned '{journal_mode}'"),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(store_err("configure pragmas"))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(store_err("create schema_version table"))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err("get schema version"))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "database schema version {from_version} is newer than supported \
                     version {CURRENT_SCHEMA_VERSION}; upgrade the application"
                ),
            ));
        }
        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS manuscripts (
                    id TEXT PRIMARY KEY,
                    status TEXT NOT NULL,
                    body TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS reviews (
                    id TEXT PRIMARY KEY,
                    manuscript_id TEXT NOT NULL,
                    reviewer_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    body TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_reviews_manuscript
                    ON reviews(manuscript_id);
                CREATE INDEX IF NOT EXISTS idx_reviews_reviewer
                    ON reviews(reviewer_id);

                CREATE TABLE IF NOT EXISTS invitations (
                    id TEXT PRIMARY KEY,
                    manuscript_id TEXT NOT NULL,
                    email TEXT NOT NULL,
                    token TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    body TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_invitations_pair
                    ON invitations(email, manuscript_id, status);
                "#,
            )
            .map_err(store_err("migration v1"))?;
        }

        conn.execute(
            "INSERT INTO schema_version (id, version) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET version = ?1",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(store_err("record schema version"))?;

        Ok(())
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| RepositoryError::storage(operation, "connection mutex poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert_manuscript(&self, manuscript: &Manuscript) -> Result<(), RepositoryError> {
        let id = manuscript.id.to_string();
        let status = manuscript.status.as_str();
        let body = serde_json::to_string(manuscript)?;
        self.with_conn("insert_manuscript", move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO manuscripts (id, status, body) VALUES (?1, ?2, ?3)",
                params![id, status, body],
            )
            .map_err(store_err("insert_manuscript"))?;
            Ok(())
        })
        .await
    }

    async fn manuscript(
        &self,
        id: ManuscriptId,
    ) -> Result<Option<Manuscript>, RepositoryError> {
        let key = id.to_string();
        let body: Option<String> = self
            .with_conn("get_manuscript", move |conn| {
                conn.query_row(
                    "SELECT body FROM manuscripts WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("get_manuscript"))
            })
            .await?;
        body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
    }

    async fn resolve_manuscript(
        &self,
        id: ManuscriptId,
        from: ManuscriptStatus,
        to: ManuscriptStatus,
        acceptance_date: Option<DateTime<Utc>>,
        publication_date: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError> {
        let key = id.to_string();
        self.with_conn("resolve_manuscript", move |conn| {
            let tx = conn
                .transaction()
                .map_err(store_err("resolve_manuscript"))?;

            // The conditional update is the race arbiter: zero changed rows
            // means another reconciliation (or no-one) holds `from`.
            let changed = tx
                .execute(
                    "UPDATE manuscripts SET status = ?1 WHERE id = ?2 AND status = ?3",
                    params![to.as_str(), key, from.as_str()],
                )
                .map_err(store_err("resolve_manuscript"))?;
            if changed == 0 {
                return Ok(false);
            }

            let body: String = tx
                .query_row(
                    "SELECT body FROM manuscripts WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .map_err(store_err("resolve_manuscript"))?;
            let mut manuscript: Manuscript = serde_json::from_str(&body)?;
            manuscript.status = to;
            if acceptance_date.is_some() {
                manuscript.acceptance_date = acceptance_date;
            }
            if publication_date.is_some() {
                manuscript.publication_date = publication_date;
            }
            let body = serde_json::to_string(&manuscript)?;
            tx.execute(
                "UPDATE manuscripts SET body = ?1 WHERE id = ?2",
                params![body, key],
            )
            .map_err(store_err("resolve_manuscript"))?;

            tx.commit().map_err(store_err("resolve_manuscript"))?;
            Ok(true)
        })
        .await
    }

    async fn create_panel(
        &self,
        manuscript_id: ManuscriptId,
        records: Vec<ReviewRecord>,
    ) -> Result<PanelCreated, RepositoryError> {
        let key = manuscript_id.to_string();
        self.with_conn("create_panel", move |conn| {
            let tx = conn.transaction().map_err(store_err("create_panel"))?;

            let existing: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM reviews WHERE manuscript_id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .map_err(store_err("create_panel"))?;
            if existing > 0 {
                return Ok(PanelCreated::AlreadyAssigned);
            }

            let body: Option<String> = tx
                .query_row(
                    "SELECT body FROM manuscripts WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("create_panel"))?;
            let Some(body) = body else {
                return Err(RepositoryError::storage(
                    "create_panel",
                    format!("manuscript {key} not found"),
                ));
            };
            let mut manuscript: Manuscript = serde_json::from_str(&body)?;
            manuscript.status = ManuscriptStatus::UnderReview;
            let body = serde_json::to_string(&manuscript)?;
            tx.execute(
                "UPDATE manuscripts SET status = ?1, body = ?2 WHERE id = ?3",
                params![ManuscriptStatus::UnderReview.as_str(), body, key],
            )
            .map_err(store_err("create_panel"))?;

            for record in &records {
                let record_body = serde_json::to_string(record)?;
                tx.execute(
                    "INSERT INTO reviews (id, manuscript_id, reviewer_id, status, body)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.id.to_string(),
                        record.manuscript_id.to_string(),
                        record.reviewer_id.to_string(),
                        record.status.as_str(),
                        record_body
                    ],
                )
                .map_err(store_err("create_panel"))?;
            }

            tx.commit().map_err(store_err("create_panel"))?;
            Ok(PanelCreated::Created(records))
        })
        .await
    }

    async fn insert_review(&self, record: &ReviewRecord) -> Result<(), RepositoryError> {
        let id = record.id.to_string();
        let manuscript_id = record.manuscript_id.to_string();
        let reviewer_id = record.reviewer_id.to_string();
        let status = record.status.as_str();
        let body = serde_json::to_string(record)?;
        self.with_conn("insert_review", move |conn| {
            conn.execute(
                "INSERT INTO reviews (id, manuscript_id, reviewer_id, status, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, manuscript_id, reviewer_id, status, body],
            )
            .map_err(store_err("insert_review"))?;
            Ok(())
        })
        .await
    }

    async fn review(&self, id: ReviewId) -> Result<Option<ReviewRecord>, RepositoryError> {
        let key = id.to_string();
        let body: Option<String> = self
            .with_conn("get_review", move |conn| {
                conn.query_row(
                    "SELECT body FROM reviews WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("get_review"))
            })
            .await?;
        body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
    }

    async fn review_for_reviewer(
        &self,
        id: ReviewId,
        reviewer_id: UserId,
    ) -> Result<Option<ReviewRecord>, RepositoryError> {
        let key = id.to_string();
        let reviewer = reviewer_id.to_string();
        let body: Option<String> = self
            .with_conn("get_review_for_reviewer", move |conn| {
                conn.query_row(
                    "SELECT body FROM reviews WHERE id = ?1 AND reviewer_id = ?2",
                    params![key, reviewer],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("get_review_for_reviewer"))
            })
            .await?;
        body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
    }

    async fn reviews_for_manuscript(
        &self,
        manuscript_id: ManuscriptId,
    ) -> Result<Vec<ReviewRecord>, RepositoryError> {
        let key = manuscript_id.to_string();
        let bodies: Vec<String> = self
            .with_conn("reviews_for_manuscript", move |conn| {
                let mut stmt = conn
                    .prepare("SELECT body FROM reviews WHERE manuscript_id = ?1")
                    .map_err(store_err("reviews_for_manuscript"))?;
                let rows = stmt
                    .query_map(params![key], |row| row.get::<_, String>(0))
                    .map_err(store_err("reviews_for_manuscript"))?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(store_err("reviews_for_manuscript"))
            })
            .await?;
        let mut records = bodies
            .iter()
            .map(|b| serde_json::from_str::<ReviewRecord>(b))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.reviewer_number);
        Ok(records)
    }

    async fn reviews_for_reviewer(
        &self,
        reviewer_id: UserId,
    ) -> Result<Vec<ReviewRecord>, RepositoryError> {
        let key = reviewer_id.to_string();
        let bodies: Vec<String> = self
            .with_conn("reviews_for_reviewer", move |conn| {
                let mut stmt = conn
                    .prepare("SELECT body FROM reviews WHERE reviewer_id = ?1")
                    .map_err(store_err("reviews_for_reviewer"))?;
                let rows = stmt
                    .query_map(params![key], |row| row.get::<_, String>(0))
                    .map_err(store_err("reviews_for_reviewer"))?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(store_err("reviews_for_reviewer"))
            })
            .await?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(Into::into))
            .collect()
    }

    async fn update_review(&self, record: &ReviewRecord) -> Result<(), RepositoryError> {
        let id = record.id.to_string();
        let status = record.status.as_str();
        let body = serde_json::to_string(record)?;
        self.with_conn("update_review", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE reviews SET status = ?1, body = ?2 WHERE id = ?3",
                    params![status, body, id],
                )
                .map_err(store_err("update_review"))?;
            if changed == 0 {
                return Err(RepositoryError::storage(
                    "update_review",
                    format!("review {id} not found"),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn open_review_count(&self, reviewer_id: UserId) -> Result<usize, RepositoryError> {
        let key = reviewer_id.to_string();
        self.with_conn("open_review_count", move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM reviews WHERE reviewer_id = ?1 AND status != 'completed'",
                    params![key],
                    |row| row.get(0),
                )
                .map_err(store_err("open_review_count"))?;
            Ok(count as usize)
        })
        .await
    }

    async fn insert_invitation(
        &self,
        invitation: &ReviewerInvitation,
    ) -> Result<(), RepositoryError> {
        let id = invitation.id.to_string();
        let manuscript_id = invitation.manuscript_id.to_string();
        let email = invitation.email.clone();
        let token = invitation.token.0.clone();
        let status = invitation.status.as_str();
        let body = serde_json::to_string(invitation)?;
        self.with_conn("insert_invitation", move |conn| {
            conn.execute(
                "INSERT INTO invitations (id, manuscript_id, email, token, status, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, manuscript_id, email, token, status, body],
            )
            .map_err(store_err("insert_invitation"))?;
            Ok(())
        })
        .await
    }

    async fn open_invitation(
        &self,
        email: &str,
        manuscript_id: ManuscriptId,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewerInvitation>, RepositoryError> {
        let email = email.to_string();
        let key = manuscript_id.to_string();
        let bodies: Vec<String> = self
            .with_conn("open_invitation", move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT body FROM invitations
                         WHERE email = ?1 AND manuscript_id = ?2 AND status = 'pending'",
                    )
                    .map_err(store_err("open_invitation"))?;
                let rows = stmt
                    .query_map(params![email, key], |row| row.get::<_, String>(0))
                    .map_err(store_err("open_invitation"))?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(store_err("open_invitation"))
            })
            .await?;
        for body in bodies {
            let invitation: ReviewerInvitation = serde_json::from_str(&body)?;
            if invitation.is_open(now) {
                return Ok(Some(invitation));
            }
        }
        Ok(None)
    }

    async fn invitation_by_token(
        &self,
        token: &InvitationToken,
    ) -> Result<Option<ReviewerInvitation>, RepositoryError> {
        let key = token.0.clone();
        let body: Option<String> = self
            .with_conn("invitation_by_token", move |conn| {
                conn.query_row(
                    "SELECT body FROM invitations WHERE token = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("invitation_by_token"))
            })
            .await?;
        body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
    }

    async fn update_invitation(
        &self,
        invitation: &ReviewerInvitation,
    ) -> Result<(), RepositoryError> {
        let id = invitation.id.to_string();
        let status = invitation.status.as_str();
        let body = serde_json::to_string(invitation)?;
        self.with_conn("update_invitation", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE invitations SET status = ?1, body = ?2 WHERE id = ?3",
                    params![status, body, id],
                )
                .map_err(store_err("update_invitation"))?;
            if changed == 0 {
                return Err(RepositoryError::storage(
                    "update_invitation",
                    format!("invitation {id} not found"),
                ));
            }
            Ok(())
        })
        .await
    }
}
