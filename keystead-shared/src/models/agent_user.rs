//! Pending invitations
//!
//! An agent user records that an email address was invited to an account before
//! any user existed for it. When a user with that email completes signup, each
//! agent user is converted into a [`super::Role`] at the invited tier and deleted.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AgentUser {
    pub id: Uuid,
    pub account_id: Uuid,
    pub email: String,

    /// Tier the invitee receives on conversion
    pub tier: i16,

    pub created_at: DateTime<Utc>,
}

impl AgentUser {
    pub fn new(account_id: Uuid, email: impl Into<String>, tier: i16) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            email: email.into(),
            tier,
            created_at: Utc::now(),
        }
    }

    /// Inserts an invitation
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the email is already invited to the account
    pub async fn insert<'e, E>(executor: E, agent: &AgentUser) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO agent_users (id, account_id, email, tier, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(agent.id)
        .bind(agent.account_id)
        .bind(&agent.email)
        .bind(agent.tier)
        .bind(agent.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find<'e, E>(
        executor: E,
        email: &str,
        account_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, AgentUser>(
            r#"
            SELECT id, account_id, email, tier, created_at
            FROM agent_users
            WHERE email = $1 AND account_id = $2
            "#,
        )
        .bind(email)
        .bind(account_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists every pending invitation for an email, across accounts
    pub async fn list_by_email<'e, E>(executor: E, email: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, AgentUser>(
            r#"
            SELECT id, account_id, email, tier, created_at
            FROM agent_users
            WHERE email = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(email)
        .fetch_all(executor)
        .await
    }

    /// Lists pending invitations of an account, oldest first
    pub async fn list_by_account<'e, E>(
        executor: E,
        account_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, AgentUser>(
            r#"
            SELECT id, account_id, email, tier, created_at
            FROM agent_users
            WHERE account_id = $1
            ORDER BY created_at ASC, email ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM agent_users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
