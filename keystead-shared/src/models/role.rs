//! Role model and database operations
//!
//! A role grants one user a permission tier within one account. The pair
//! `(user_id, account_id)` is the primary key, so a user holds at most one role
//! per account.
//!
//! # Tiers
//!
//! Lower numbers carry more authority:
//!
//! | tier | meaning |
//! |------|---------|
//! | 0    | owner   |
//! | 1    | admin   |
//! | 2    | member  |
//!
//! The tier is stored as a raw integer. Values outside `0..=2` can exist in the
//! table but map to no [`RoleTier`] and therefore pass no permission gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Permission tiers, ordered from most to least authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleTier {
    /// Full control, including account updates and membership management
    Owner,

    /// Can read the detailed account view
    Admin,

    /// Can read the account
    Member,
}

impl RoleTier {
    /// Stored integer for this tier
    pub const fn as_i16(self) -> i16 {
        match self {
            RoleTier::Owner => 0,
            RoleTier::Admin => 1,
            RoleTier::Member => 2,
        }
    }

    /// Maps a stored integer back to a tier, `None` for unknown values
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(RoleTier::Owner),
            1 => Some(RoleTier::Admin),
            2 => Some(RoleTier::Member),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTier::Owner => "owner",
            RoleTier::Admin => "admin",
            RoleTier::Member => "member",
        }
    }

    /// Checks if this tier carries at least the authority of `required`
    ///
    /// Hierarchy: Owner > Admin > Member
    pub fn is_at_least(self, required: RoleTier) -> bool {
        self.as_i16() <= required.as_i16()
    }
}

/// Membership of a user in an account
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Role {
    pub user_id: Uuid,
    pub account_id: Uuid,

    /// Raw tier, see [`RoleTier`]
    pub tier: i16,

    pub created_at: DateTime<Utc>,
}

/// A role joined with the identifying fields of its user
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AccountMember {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tier: i16,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(user_id: Uuid, account_id: Uuid, tier: i16) -> Self {
        Self {
            user_id,
            account_id,
            tier,
            created_at: Utc::now(),
        }
    }

    /// Tier as an enum, `None` for values outside the known range
    pub fn role_tier(&self) -> Option<RoleTier> {
        RoleTier::from_i16(self.tier)
    }

    /// Inserts a role
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the user already has a role in the account
    pub async fn insert<'e, E>(executor: E, role: &Role) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO roles (user_id, account_id, tier, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(role.user_id)
        .bind(role.account_id)
        .bind(role.tier)
        .bind(role.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find<'e, E>(
        executor: E,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT user_id, account_id, tier, created_at
            FROM roles
            WHERE user_id = $1 AND account_id = $2
            "#,
        )
        .bind(user_id)
        .bind(account_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists every member of an account, oldest membership first
    pub async fn list_members<'e, E>(
        executor: E,
        account_id: Uuid,
    ) -> Result<Vec<AccountMember>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, AccountMember>(
            r#"
            SELECT u.id AS user_id, u.email, u.first_name, u.last_name, r.tier, r.created_at
            FROM roles r
            JOIN users u ON u.id = r.user_id
            WHERE r.account_id = $1
            ORDER BY r.created_at ASC, u.email ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await
    }

    /// Deletes a role
    ///
    /// # Returns
    ///
    /// `true` if a role was deleted
    pub async fn delete<'e, E>(
        executor: E,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM roles
            WHERE user_id = $1 AND account_id = $2
            "#,
        )
        .bind(user_id)
        .bind(account_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_round_trip_through_storage() {
        for tier in [RoleTier::Owner, RoleTier::Admin, RoleTier::Member] {
            assert_eq!(RoleTier::from_i16(tier.as_i16()), Some(tier));
        }
        assert_eq!(RoleTier::from_i16(3), None);
        assert_eq!(RoleTier::from_i16(-1), None);
    }

    #[test]
    fn test_tier_hierarchy() {
        assert!(RoleTier::Owner.is_at_least(RoleTier::Owner));
        assert!(RoleTier::Owner.is_at_least(RoleTier::Member));
        assert!(RoleTier::Admin.is_at_least(RoleTier::Admin));
        assert!(!RoleTier::Admin.is_at_least(RoleTier::Owner));
        assert!(RoleTier::Member.is_at_least(RoleTier::Member));
        assert!(!RoleTier::Member.is_at_least(RoleTier::Admin));
    }

    #[test]
    fn test_unknown_stored_tier_has_no_role_tier() {
        let role = Role::new(Uuid::new_v4(), Uuid::new_v4(), 7);
        assert_eq!(role.role_tier(), None);
    }
}
