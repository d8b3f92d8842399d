//! Account reads, updates and membership management
//!
//! Callers are expected to have passed the matching role gate already; these
//! operations check only what depends on the data itself.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::crypto::{decrypt_record, encrypt_record, DataCrypto};
use crate::email::{EmailSender, EmailTemplate, Substitutions, ACCOUNT_TITLE_KEY, INVITER_NAME_KEY};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Account, AccountData, AccountMember, AgentUser, Role, RoleTier, User};
use crate::store::Store;

/// An account with its payload decrypted
#[derive(Debug, Clone, PartialEq)]
pub struct AccountView {
    pub id: Uuid,
    pub data: AccountData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current members and pending invitations of an account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRoster {
    pub members: Vec<AccountMember>,
    pub pending: Vec<AgentUser>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailedAccount {
    pub account: AccountView,
    pub roster: AccountRoster,
}

/// What adding an email to an account produced
#[derive(Debug, Clone, PartialEq)]
pub enum AddedMember {
    /// The email belonged to a user, who now holds a role
    Member(Role),

    /// No user had the email; an invitation is pending
    Invited(AgentUser),
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    crypto: Arc<dyn DataCrypto>,
    email: Arc<dyn EmailSender>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        crypto: Arc<dyn DataCrypto>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            store,
            crypto,
            email,
        }
    }

    async fn load(&self, account_id: Uuid) -> ServiceResult<(Account, AccountView)> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))?;
        let data: AccountData = decrypt_record(self.crypto.as_ref(), &account.data).await?;

        let view = AccountView {
            id: account.id,
            data,
            created_at: account.created_at,
            updated_at: account.updated_at,
        };
        Ok((account, view))
    }

    pub async fn get_account(&self, account_id: Uuid) -> ServiceResult<AccountView> {
        Ok(self.load(account_id).await?.1)
    }

    pub async fn list_users(&self, account_id: Uuid) -> ServiceResult<AccountRoster> {
        Ok(AccountRoster {
            members: self.store.list_account_members(account_id).await?,
            pending: self.store.list_account_agent_users(account_id).await?,
        })
    }

    /// The account together with its roster
    pub async fn get_detailed_account(&self, account_id: Uuid) -> ServiceResult<DetailedAccount> {
        let account = self.get_account(account_id).await?;
        let roster = self.list_users(account_id).await?;
        Ok(DetailedAccount { account, roster })
    }

    /// Re-encrypts and stores a new payload
    pub async fn update_account(
        &self,
        account_id: Uuid,
        data: AccountData,
    ) -> ServiceResult<AccountView> {
        let (mut account, _) = self.load(account_id).await?;

        account.data = encrypt_record(self.crypto.as_ref(), &data).await?;
        account.updated_at = Utc::now();
        self.store.save_account(&account).await?;

        info!(account_id = %account.id, "Account updated");
        Ok(AccountView {
            id: account.id,
            data,
            created_at: account.created_at,
            updated_at: account.updated_at,
        })
    }

    /// Grants `email` a role, or invites it if no user has that email
    ///
    /// # Errors
    ///
    /// - `BadRequest` unless `tier` is admin (1) or member (2)
    /// - `NotFound` if the account does not exist
    /// - `Conflict` if the user already has a role here or the email is already invited
    pub async fn add_user(
        &self,
        account_id: Uuid,
        inviter: &User,
        email: &str,
        tier: i16,
    ) -> ServiceResult<AddedMember> {
        match RoleTier::from_i16(tier) {
            Some(RoleTier::Admin) | Some(RoleTier::Member) => {}
            _ => {
                return Err(ServiceError::BadRequest(
                    "Role must be 1 (admin) or 2 (member)".to_string(),
                ))
            }
        }

        let (_, view) = self.load(account_id).await?;

        let existing = self.store.find_user_by_email(email).await?;
        if let Some(user) = &existing {
            if self.store.find_role(user.id, account_id).await?.is_some() {
                return Err(ServiceError::Conflict(
                    "User already has a role in this account".to_string(),
                ));
            }
        }
        if self.store.find_agent_user(email, account_id).await?.is_some() {
            return Err(ServiceError::Conflict(
                "User has already been invited to this account".to_string(),
            ));
        }

        let mut substitutions = Substitutions::new();
        substitutions.insert(ACCOUNT_TITLE_KEY.to_string(), view.data.title.clone());
        substitutions.insert(INVITER_NAME_KEY.to_string(), inviter.display_name());

        match existing {
            Some(user) => {
                let role = Role::new(user.id, account_id, tier);
                self.store.insert_role(&role).await?;
                self.email
                    .send(EmailTemplate::AddedToAccount, &user.email, substitutions)
                    .await?;
                info!(account_id = %account_id, user_id = %user.id, tier, "User added to account");
                Ok(AddedMember::Member(role))
            }
            None => {
                let invitation = AgentUser::new(account_id, email, tier);
                self.store.insert_agent_user(&invitation).await?;
                self.email
                    .send(EmailTemplate::AccountInvitation, email, substitutions)
                    .await?;
                info!(account_id = %account_id, tier, "Invitation created");
                Ok(AddedMember::Invited(invitation))
            }
        }
    }

    /// Removes a non-owner member
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user has no role in the account
    /// - `Forbidden` if the user is an owner
    pub async fn remove_user(&self, account_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        let role = self
            .store
            .find_role(user_id, account_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("User is not a member of this account".to_string())
            })?;

        if role.role_tier() == Some(RoleTier::Owner) {
            return Err(ServiceError::Forbidden(
                "Cannot remove owners from account".to_string(),
            ));
        }

        self.store.delete_role(user_id, account_id).await?;
        info!(account_id = %account_id, user_id = %user_id, "User removed from account");
        Ok(())
    }
}
