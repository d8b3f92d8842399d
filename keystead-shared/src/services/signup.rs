//! Signup state machine
//!
//! ```text
//! NoRecord --initiate--> EmailPending(code) --verify_code--> CodeVerified(signup token)
//!                              ^    |                               |
//!                              +----+ initiate again (new code)     +--complete_account--> Completed
//! ```
//!
//! Completion creates the account, activates the user, makes them owner and
//! converts every pending invitation for their email into a role, all in one
//! transaction.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::code::{assign_code, check_code, CodeCheck};
use crate::auth::jwt::{IssuedToken, TokenIssuer};
use crate::auth::password::{hash_password_async, validate_password_strength};
use crate::auth::session::{RotatedSession, SessionRotator};
use crate::crypto::{encrypt_record, DataCrypto};
use crate::email::{EmailSender, EmailTemplate, Substitutions, CODE_KEY};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Account, AccountData, Role, RoleTier, User, UserState};
use crate::store::Store;

/// Everything the final signup step collects
#[derive(Debug, Clone)]
pub struct CompleteAccount {
    pub account: AccountData,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Result of a completed signup
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub account_id: Uuid,

    /// Number of invitations converted into roles
    pub converted_invitations: usize,

    /// The now active user and their first session token
    pub session: RotatedSession,
}

#[derive(Clone)]
pub struct SignupService {
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    crypto: Arc<dyn DataCrypto>,
    email: Arc<dyn EmailSender>,
    sessions: SessionRotator,
}

impl SignupService {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenIssuer,
        crypto: Arc<dyn DataCrypto>,
        email: Arc<dyn EmailSender>,
        sessions: SessionRotator,
    ) -> Self {
        Self {
            store,
            tokens,
            crypto,
            email,
            sessions,
        }
    }

    /// Starts or restarts signup for `email` and sends a signup code
    ///
    /// # Errors
    ///
    /// `Conflict` if an active user already owns the email.
    pub async fn initiate(&self, email: &str) -> ServiceResult<()> {
        let now = Utc::now();
        let code = match self.store.find_user_by_email(email).await? {
            Some(user) if !user.is_provisional() => {
                return Err(ServiceError::Conflict(
                    "An account with this email already exists".to_string(),
                ));
            }
            Some(mut user) => {
                let code = assign_code(&mut user, now);
                user.updated_at = now;
                self.store.save_user(&user).await?;
                info!(user_id = %user.id, "Signup restarted for provisional user");
                code
            }
            None => {
                let mut user = User::provisional(email);
                let code = assign_code(&mut user, now);
                self.store.insert_user(&user).await?;
                info!(user_id = %user.id, "Provisional user created");
                code
            }
        };

        let mut substitutions = Substitutions::new();
        substitutions.insert(CODE_KEY.to_string(), code.to_string());
        self.email
            .send(EmailTemplate::SignupCode, email, substitutions)
            .await?;

        Ok(())
    }

    /// Exchanges a signup code for a signup token
    ///
    /// # Errors
    ///
    /// - `NotFound` if no user exists for the email
    /// - `Conflict` if the user already completed signup
    /// - `Unauthenticated` for a wrong or expired code; an expired code is cleared
    pub async fn verify_code(&self, email: &str, code: i32) -> ServiceResult<IssuedToken> {
        let now = Utc::now();
        let mut user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if !user.is_provisional() {
            return Err(ServiceError::Conflict(
                "Signup already completed for this email".to_string(),
            ));
        }

        match check_code(&user, code, now) {
            CodeCheck::Mismatch => Err(ServiceError::Unauthenticated("Invalid code".to_string())),
            CodeCheck::Expired => {
                user.clear_code();
                user.updated_at = now;
                self.store.save_user(&user).await?;
                Err(ServiceError::Unauthenticated("Code expired".to_string()))
            }
            CodeCheck::Valid => {
                user.clear_code();
                user.updated_at = now;
                self.store.save_user(&user).await?;
                Ok(self.tokens.issue_signup(user.id, &user.email)?)
            }
        }
    }

    /// Creates the first account for a verified signup
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the signup token is missing, invalid or expired
    /// - `NotFound` if the token does not name a provisional user with its email
    /// - `BadRequest` if the password is too weak
    /// - `Internal` if the transaction fails; nothing is written in that case
    pub async fn complete_account(
        &self,
        signup_token: &str,
        request: CompleteAccount,
    ) -> ServiceResult<SignupOutcome> {
        let claims = self.tokens.validate_signup(signup_token)?;
        let claimed_email = claims.email.unwrap_or_default();

        let pending = |user: &User| user.is_provisional() && user.email == claimed_email;
        let no_pending = || ServiceError::NotFound("No pending signup for this token".to_string());

        self.store
            .find_user_by_id(claims.sub)
            .await?
            .filter(|user| pending(user))
            .ok_or_else(no_pending)?;

        validate_password_strength(&request.password)?;

        // Encryption and hashing happen before the transaction opens.
        let data = encrypt_record(self.crypto.as_ref(), &request.account).await?;
        let password_hash = hash_password_async(request.password).await?;

        let mut tx = self.store.begin().await?;

        // A concurrent completion may have activated the user since the first read.
        let mut user = tx
            .lock_user(claims.sub)
            .await?
            .filter(|user| pending(user))
            .ok_or_else(no_pending)?;

        let account = Account::new(data);
        user.first_name = request.first_name;
        user.last_name = request.last_name;
        user.phone = request.phone;
        user.password_hash = password_hash;
        user.state = UserState::Active;
        user.updated_at = Utc::now();

        tx.insert_account(&account).await?;
        tx.save_user(&user).await?;
        tx.insert_role(&Role::new(user.id, account.id, RoleTier::Owner.as_i16()))
            .await?;

        let invitations = tx.list_agent_users_by_email(&user.email).await?;
        for invitation in &invitations {
            tx.insert_role(&Role::new(user.id, invitation.account_id, invitation.tier))
                .await?;
            tx.delete_agent_user(invitation.id).await?;
        }
        tx.commit().await?;

        info!(
            user_id = %user.id,
            account_id = %account.id,
            converted_invitations = invitations.len(),
            "Signup completed"
        );

        let session = self.sessions.rotate(user).await?;

        Ok(SignupOutcome {
            account_id: account.id,
            converted_invitations: invitations.len(),
            session,
        })
    }
}
