//! Account role resolution and tier gates
//!
//! Authorization happens in two steps per request:
//!
//! 1. **Resolution**: find the account the request targets and load the caller's
//!    [`Role`](crate::models::Role) in it. The result is an [`AccountRole`] that is
//!    cached for the rest of the request; the role is never queried twice.
//! 2. **Gates**: a [`RoleGate`] checks the cached tier against the tier the
//!    operation needs.
//!
//! # Account id lookup
//!
//! The `account_id` path parameter wins. Without one, the `accountId` field of
//! the JSON request body is used. A path-scoped route therefore cannot be
//! redirected to another account through the body.
//!
//! # Example
//!
//! ```
//! use keystead_shared::auth::authorization::{AccountRole, RoleGate};
//! use uuid::Uuid;
//!
//! let admin = AccountRole { account_id: Uuid::new_v4(), tier: 1 };
//! assert!(RoleGate::Member.check(Some(&admin)).is_ok());
//! assert!(RoleGate::Admin.check(Some(&admin)).is_ok());
//! assert!(RoleGate::Owner.check(Some(&admin)).is_err());
//! ```

use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::models::RoleTier;
use crate::store::{Store, StoreError};

/// Path parameter naming the target account
pub const ACCOUNT_ID_PARAM: &str = "account_id";

/// JSON body field naming the target account when no path parameter exists
pub const ACCOUNT_ID_BODY_FIELD: &str = "accountId";

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Invalid account ID format")]
    InvalidAccountId,

    #[error("Account ID required")]
    MissingAccountId,

    #[error("Access denied - no role found for account {account_id}")]
    NoRole { account_id: Uuid },

    #[error("{0} access required")]
    InsufficientTier(RoleGate),

    /// A gate ran before role resolution; a routing mistake, not a client error
    #[error("Account role not resolved before {0} gate")]
    RoleNotResolved(RoleGate),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The caller's resolved role in the targeted account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRole {
    pub account_id: Uuid,

    /// Raw stored tier
    pub tier: i16,
}

impl AccountRole {
    pub fn role_tier(&self) -> Option<RoleTier> {
        RoleTier::from_i16(self.tier)
    }
}

/// Minimum tier an operation requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGate {
    Owner,
    Admin,
    Member,
}

impl fmt::Display for RoleGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleGate::Owner => "Owner",
            RoleGate::Admin => "Admin",
            RoleGate::Member => "Member",
        };
        f.write_str(name)
    }
}

impl RoleGate {
    pub fn required_tier(self) -> RoleTier {
        match self {
            RoleGate::Owner => RoleTier::Owner,
            RoleGate::Admin => RoleTier::Admin,
            RoleGate::Member => RoleTier::Member,
        }
    }

    /// Whether a raw stored tier passes this gate
    ///
    /// Unknown tiers pass no gate.
    pub fn admits(self, tier: i16) -> bool {
        RoleTier::from_i16(tier)
            .map(|tier| tier.is_at_least(self.required_tier()))
            .unwrap_or(false)
    }

    /// Checks a resolved role against this gate
    ///
    /// # Errors
    ///
    /// - `RoleNotResolved` if no role was resolved for the request
    /// - `InsufficientTier` if the tier is too low or unknown
    pub fn check(self, resolved: Option<&AccountRole>) -> Result<(), AuthzError> {
        let role = resolved.ok_or(AuthzError::RoleNotResolved(self))?;

        if !self.admits(role.tier) {
            return Err(AuthzError::InsufficientTier(self));
        }

        Ok(())
    }
}

/// Determines the targeted account
///
/// `path_value` is the raw `account_id` path parameter, if the route has one.
/// `body` is the parsed JSON body, consulted only without a path parameter.
pub fn account_id_from_request(
    path_value: Option<&str>,
    body: Option<&Value>,
) -> Result<Uuid, AuthzError> {
    if let Some(raw) = path_value {
        return Uuid::parse_str(raw).map_err(|_| AuthzError::InvalidAccountId);
    }

    let field = body
        .and_then(|body| body.get(ACCOUNT_ID_BODY_FIELD))
        .ok_or(AuthzError::MissingAccountId)?;

    field
        .as_str()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(AuthzError::InvalidAccountId)
}

/// Loads the caller's role in `account_id`
///
/// # Errors
///
/// `NoRole` if the user has no role in the account, including when the account
/// does not exist.
pub async fn resolve_account_role(
    store: &dyn Store,
    user_id: Uuid,
    account_id: Uuid,
) -> Result<AccountRole, AuthzError> {
    let role = store
        .find_role(user_id, account_id)
        .await?
        .ok_or(AuthzError::NoRole { account_id })?;

    Ok(AccountRole {
        account_id,
        tier: role.tier,
    })
}
