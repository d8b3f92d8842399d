//! Two-step login: password, then an emailed one-time code

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::auth::code::{assign_code, check_code, CodeCheck};
use crate::auth::password::verify_password_async;
use crate::auth::session::{RotatedSession, SessionRotator};
use crate::email::{EmailSender, EmailTemplate, Substitutions, CODE_KEY};
use crate::error::{ServiceError, ServiceResult};
use crate::models::User;
use crate::store::Store;

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthenticated("Invalid credentials".to_string())
}

#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn Store>,
    email: Arc<dyn EmailSender>,
    sessions: SessionRotator,
}

impl LoginService {
    pub fn new(store: Arc<dyn Store>, email: Arc<dyn EmailSender>, sessions: SessionRotator) -> Self {
        Self {
            store,
            email,
            sessions,
        }
    }

    /// Loads an active user by email; anything else reads as bad credentials
    async fn active_user(&self, email: &str) -> ServiceResult<User> {
        self.store
            .find_user_by_email(email)
            .await?
            .filter(|user| !user.is_provisional())
            .ok_or_else(invalid_credentials)
    }

    /// Checks the password and emails a login code
    ///
    /// Unknown emails, unfinished signups and wrong passwords all fail with the
    /// same `Unauthenticated("Invalid credentials")`.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<()> {
        let mut user = self.active_user(email).await?;

        let verified =
            verify_password_async(password.to_string(), user.password_hash.clone()).await?;
        if !verified {
            return Err(invalid_credentials());
        }

        let code = assign_code(&mut user, Utc::now());
        self.store.save_user(&user).await?;

        let mut substitutions = Substitutions::new();
        substitutions.insert(CODE_KEY.to_string(), code.to_string());
        self.email
            .send(EmailTemplate::LoginCode, &user.email, substitutions)
            .await?;

        info!(user_id = %user.id, "Login code issued");
        Ok(())
    }

    /// Exchanges a login code for the first session token
    pub async fn verify(&self, email: &str, code: i32) -> ServiceResult<RotatedSession> {
        let now = Utc::now();
        let mut user = self.active_user(email).await?;

        match check_code(&user, code, now) {
            CodeCheck::Mismatch => Err(ServiceError::Unauthenticated("Invalid code".to_string())),
            CodeCheck::Expired => {
                user.clear_code();
                self.store.save_user(&user).await?;
                Err(ServiceError::Unauthenticated("Code expired".to_string()))
            }
            CodeCheck::Valid => {
                user.clear_code();
                user.updated_at = now;
                let session = self.sessions.rotate(user).await?;
                info!(user_id = %session.user.id, "Login completed");
                Ok(session)
            }
        }
    }
}
