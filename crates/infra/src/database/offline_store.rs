//! Offline (tier 3) credential store
//!
//! Local users with bcrypt password hashes and opaque session tokens. Tokens
//! are random strings, not JWTs, and are only meaningful to this store.
//!
//! A session is never updated: refresh deletes the row and inserts a new one
//! inside one transaction, so a refresh token works exactly once.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tiergate_domain::constants::LOCAL_TOKEN_BYTES;
use tiergate_domain::{LocalSession, LocalUser, OfflineStoreSettings, Result};
use tokio::task::{self, JoinError};
use tracing::{debug, info, instrument};

use super::error::{OfflineResult, OfflineStoreError};
use super::manager::DbManager;

const USER_COLUMNS: &str = "id, email, password_hash, created_at, updated_at";

/// SQLite-backed local authentication
#[derive(Debug, Clone)]
pub struct OfflineStore {
    db: Arc<DbManager>,
    settings: OfflineStoreSettings,
}

impl OfflineStore {
    /// Wrap an already migrated database.
    #[must_use]
    pub const fn new(db: Arc<DbManager>, settings: OfflineStoreSettings) -> Self {
        Self { db, settings }
    }

    /// Open and migrate the database named in `settings`.
    ///
    /// # Errors
    /// Returns `TiergateError::Database` if the file cannot be opened
    pub fn open(settings: &OfflineStoreSettings) -> Result<Self> {
        let db = DbManager::open_migrated(&settings.db_path)?;
        Ok(Self::new(Arc::new(db), settings.clone()))
    }

    /// The underlying database.
    #[must_use]
    pub fn db(&self) -> &DbManager {
        &self.db
    }

    /// Create a user with a bcrypt-hashed password.
    ///
    /// # Errors
    /// - `EmptyEmail` / `EmptyPassword` for blank input
    /// - `DuplicateEmail` when the email is taken
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> OfflineResult<LocalUser> {
        if email.is_empty() {
            return Err(OfflineStoreError::EmptyEmail);
        }
        if password.is_empty() {
            return Err(OfflineStoreError::EmptyPassword);
        }
        let email = email.to_string();
        let password = password.to_string();

        self.blocking("register", move |db, settings| {
            let password_hash = bcrypt::hash(password, settings.bcrypt_cost)?;
            let now = Utc::now().timestamp();
            let conn = db.pool().get()?;

            let inserted = conn.execute(
                "INSERT INTO users (email, password_hash, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![email, password_hash, now],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_constraint_violation(&err) => {
                    return Err(OfflineStoreError::DuplicateEmail(email));
                }
                Err(err) => return Err(err.into()),
            }

            let user = load_user(&conn, conn.last_insert_rowid())?;
            info!(user_id = user.id, "Offline user registered");
            Ok(user)
        })
        .await
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email and for a wrong password alike;
    /// both paths cost one bcrypt round at the configured cost
    #[instrument(skip_all)]
    pub async fn authenticate(&self, email: &str, password: &str) -> OfflineResult<LocalSession> {
        let email = email.to_string();
        let password = password.to_string();

        self.blocking("authenticate", move |db, settings| {
            let conn = db.pool().get()?;
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                    params![email],
                    map_user_row,
                )
                .optional()?;
            let Some(user) = user else {
                // Pay for a hash anyway so response time does not reveal which emails exist
                let _ = bcrypt::hash(&password, settings.bcrypt_cost);
                return Err(OfflineStoreError::InvalidCredentials);
            };

            if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
                return Err(OfflineStoreError::InvalidCredentials);
            }

            let session = insert_session(&conn, user.id, settings)?;
            info!(user_id = user.id, session_id = session.id, "Offline session opened");
            Ok(session)
        })
        .await
    }

    /// Resolve an access token to its user id.
    ///
    /// # Errors
    /// `InvalidToken` if no session holds the token, `TokenExpired` once the
    /// session lapsed
    pub async fn validate_token(&self, access_token: &str) -> OfflineResult<i64> {
        let access_token = access_token.to_string();

        self.blocking("validate_token", move |db, _| {
            let conn = db.pool().get()?;
            let (user_id, expires_at) = conn
                .query_row(
                    "SELECT user_id, expires_at FROM sessions WHERE access_token = ?1",
                    params![access_token],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?
                .ok_or(OfflineStoreError::InvalidToken)?;

            if Utc::now().timestamp() >= expires_at {
                return Err(OfflineStoreError::TokenExpired);
            }
            Ok(user_id)
        })
        .await
    }

    /// Rotate a session: the old row is deleted and a new one inserted.
    ///
    /// The refresh token is accepted for `refresh_ttl_seconds` after its
    /// session was created. A lapsed session is deleted as well.
    ///
    /// # Errors
    /// `InvalidRefreshToken` for an unknown or already used token,
    /// `RefreshExpired` past the refresh window
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> OfflineResult<LocalSession> {
        let refresh_token = refresh_token.to_string();

        self.blocking("refresh_session", move |db, settings| {
            let mut conn = db.pool().get()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let (session_id, user_id, created_at) = tx
                .query_row(
                    "SELECT id, user_id, created_at FROM sessions WHERE refresh_token = ?1",
                    params![refresh_token],
                    |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
                    },
                )
                .optional()?
                .ok_or(OfflineStoreError::InvalidRefreshToken)?;

            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;

            if Utc::now().timestamp() >= created_at.saturating_add(settings.refresh_ttl_seconds) {
                tx.commit()?;
                debug!(session_id, "Refresh window lapsed, session removed");
                return Err(OfflineStoreError::RefreshExpired);
            }

            let session = insert_session(&tx, user_id, settings)?;
            tx.commit()?;
            debug!(old_session_id = session_id, session_id = session.id, "Offline session rotated");
            Ok(session)
        })
        .await
    }

    /// Look a user up by id.
    ///
    /// # Errors
    /// `UserNotFound` when no such user exists
    pub async fn get_user(&self, user_id: i64) -> OfflineResult<LocalUser> {
        self.blocking("get_user", move |db, _| {
            let conn = db.pool().get()?;
            load_user(&conn, user_id)
        })
        .await
    }

    /// Delete the session holding `access_token`. Unknown tokens are ignored.
    ///
    /// # Errors
    /// Returns storage failures only
    pub async fn delete_session(&self, access_token: &str) -> OfflineResult<()> {
        let access_token = access_token.to_string();

        self.blocking("delete_session", move |db, _| {
            let conn = db.pool().get()?;
            conn.execute("DELETE FROM sessions WHERE access_token = ?1", params![access_token])?;
            Ok(())
        })
        .await
    }

    /// Delete every session of a user, returning how many were removed.
    ///
    /// # Errors
    /// Returns storage failures only
    pub async fn delete_all_sessions(&self, user_id: i64) -> OfflineResult<usize> {
        self.blocking("delete_all_sessions", move |db, _| {
            let conn = db.pool().get()?;
            let removed = conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
            debug!(user_id, removed, "Offline sessions deleted");
            Ok(removed)
        })
        .await
    }

    async fn blocking<T, F>(&self, operation: &'static str, work: F) -> OfflineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DbManager, &OfflineStoreSettings) -> OfflineResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let settings = self.settings.clone();

        task::spawn_blocking(move || work(&db, &settings))
            .await
            .map_err(|err| map_join_error(operation, &err))?
    }
}

fn insert_session(
    conn: &Connection,
    user_id: i64,
    settings: &OfflineStoreSettings,
) -> OfflineResult<LocalSession> {
    let access_token = generate_token();
    let refresh_token = generate_token();
    let now = Utc::now().timestamp();
    let expires_at = now.saturating_add(settings.session_ttl_seconds);

    conn.execute(
        "INSERT INTO sessions (user_id, access_token, refresh_token, expires_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, access_token, refresh_token, expires_at, now],
    )?;

    Ok(LocalSession {
        id: conn.last_insert_rowid(),
        user_id,
        access_token,
        refresh_token,
        expires_at: from_unix(expires_at, 4)?,
        created_at: from_unix(now, 5)?,
    })
}

fn load_user(conn: &Connection, user_id: i64) -> OfflineResult<LocalUser> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![user_id],
        map_user_row,
    )
    .optional()?
    .ok_or(OfflineStoreError::UserNotFound)
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<LocalUser> {
    Ok(LocalUser {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: from_unix(row.get(3)?, 3)?,
        updated_at: from_unix(row.get(4)?, 4)?,
    })
}

fn from_unix(secs: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(column, secs))
}

/// 32 random bytes, URL-safe base64.
fn generate_token() -> String {
    let mut bytes = [0u8; LOCAL_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}

fn map_join_error(operation: &str, err: &JoinError) -> OfflineStoreError {
    if err.is_cancelled() {
        OfflineStoreError::Task(format!("{operation} task cancelled"))
    } else {
        OfflineStoreError::Task(format!("{operation} task failed: {err}"))
    }
}
