//! User model and database operations
//!
//! A user is created `provisional` when signup starts and becomes `active` once the
//! signup flow creates its first account. The row also carries the user's single
//! pending one-time code and single live session token.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY,
//!     email TEXT NOT NULL UNIQUE,
//!     state user_state NOT NULL DEFAULT 'provisional',
//!     password_hash TEXT NOT NULL DEFAULT '',
//!     first_name TEXT NOT NULL DEFAULT '',
//!     last_name TEXT NOT NULL DEFAULT '',
//!     phone TEXT,
//!     code INTEGER,
//!     code_expires_at TIMESTAMPTZ,
//!     session_token TEXT,
//!     session_token_expires_at TIMESTAMPTZ,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Lifecycle state of a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    /// Signup started, no account created yet
    Provisional,

    /// Signup completed
    Active,
}

/// User credential record
///
/// Passwords are stored as Argon2id hashes; the hash is empty while provisional.
/// `code`/`code_expires_at` and `session_token`/`session_token_expires_at` are
/// written as pairs.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub state: UserState,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub code: Option<i32>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub session_token: Option<String>,
    pub session_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, email, state, password_hash, first_name, last_name, phone, \
     code, code_expires_at, session_token, session_token_expires_at, created_at, updated_at";

impl User {
    /// Builds a fresh provisional user for `email`
    pub fn provisional(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            state: UserState::Provisional,
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            code: None,
            code_expires_at: None,
            session_token: None,
            session_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.state == UserState::Provisional
    }

    /// Name shown to other users, falling back to the email address
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    /// Clears the pending one-time code
    pub fn clear_code(&mut self) {
        self.code = None;
        self.code_expires_at = None;
    }

    /// Binds a session token to this user, replacing any previous one
    pub fn bind_session(&mut self, token: impl Into<String>, expires_at: DateTime<Utc>) {
        self.session_token = Some(token.into());
        self.session_token_expires_at = Some(expires_at);
    }

    /// Whether `token` is this user's live session token at `now`
    ///
    /// A missing stored expiry counts as lapsed.
    pub fn holds_live_session(&self, token: &str, now: DateTime<Utc>) -> bool {
        let matches = self.session_token.as_deref() == Some(token);
        let live = self
            .session_token_expires_at
            .map(|expires_at| expires_at > now)
            .unwrap_or(false);
        matches && live
    }

    /// Inserts a new user row
    ///
    /// # Errors
    ///
    /// Returns a database error on a duplicate email (`users_email_key`)
    pub async fn insert<'e, E>(executor: E, user: &User) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, state, password_hash, first_name, last_name, phone,
                               code, code_expires_at, session_token, session_token_expires_at,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.state)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.code)
        .bind(user.code_expires_at)
        .bind(&user.session_token)
        .bind(user.session_token_expires_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Reads a user and locks the row until the surrounding transaction ends
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by exact email match
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(executor)
            .await
    }

    /// Writes every mutable column of `user` back to its row
    ///
    /// # Returns
    ///
    /// `false` if no row with `user.id` exists
    pub async fn save<'e, E>(executor: E, user: &User) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET state = $2,
                password_hash = $3,
                first_name = $4,
                last_name = $5,
                phone = $6,
                code = $7,
                code_expires_at = $8,
                session_token = $9,
                session_token_expires_at = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(user.state)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.code)
        .bind(user.code_expires_at)
        .bind(&user.session_token)
        .bind(user.session_token_expires_at)
        .bind(user.updated_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
