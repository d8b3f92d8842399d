//! Account model and database operations
//!
//! Accounts are the tenants users belong to. The descriptive payload is stored as
//! ciphertext produced by [`crate::crypto::DataCrypto`]; the database never sees
//! the plaintext title or description.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Account row with its encrypted payload
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,

    /// Ciphertext of a serialized [`AccountData`]
    pub data: Vec<u8>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plaintext account payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Account {
    /// Builds a new account around already encrypted `data`
    pub fn new(data: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn insert<'e, E>(executor: E, account: &Account) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account.id)
        .bind(&account.data)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, data, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Replaces the payload of an existing account
    ///
    /// # Returns
    ///
    /// `false` if the account does not exist
    pub async fn save<'e, E>(executor: E, account: &Account) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET data = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(&account.data)
        .bind(account.updated_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
