//! Session token rotation
//!
//! Every authenticated request presents the user's current session token and
//! receives a new one. A presented token is accepted only if it
//!
//! 1. arrives as `Authorization: Bearer <token>`,
//! 2. has a valid signature and has not expired,
//! 3. names an existing user,
//! 4. is byte-identical to the token stored on that user, and
//! 5. the stored expiry is still in the future.
//!
//! The replacement token is persisted before the request is handled, which
//! invalidates the presented one immediately. Concurrent requests with the same
//! token can both pass authentication; whichever saves last owns the session and
//! the other caller's new token stops working.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::jwt::{IssuedToken, TokenIssuer};
use crate::error::{ServiceError, ServiceResult};
use crate::models::User;
use crate::store::Store;

const BEARER_PREFIX: &str = "Bearer ";

/// A user together with the session token just bound to them
#[derive(Debug, Clone)]
pub struct RotatedSession {
    pub user: User,
    pub token: IssuedToken,
}

/// Extracts the token from an `Authorization` header value
pub fn bearer_token(header: Option<&str>) -> ServiceResult<&str> {
    let header = header
        .ok_or_else(|| ServiceError::Unauthenticated("Missing authorization header".to_string()))?;

    header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthenticated("Expected Bearer token".to_string()))
}

#[derive(Clone)]
pub struct SessionRotator {
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
}

impl SessionRotator {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    /// Checks a presented session token and returns its user
    ///
    /// Every failure is `Unauthenticated`.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<User> {
        let claims = self.tokens.validate_session(token)?;

        let user = self
            .store
            .find_user_by_id(claims.sub)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated("User not found".to_string()))?;

        if !user.holds_live_session(token, Utc::now()) {
            debug!(user_id = %user.id, "Presented token is not the live session token");
            return Err(ServiceError::Unauthenticated(
                "Invalid or expired session".to_string(),
            ));
        }

        Ok(user)
    }

    /// Issues a new session token for `user` and persists it
    ///
    /// The previous token stops being accepted once this returns.
    pub async fn rotate(&self, mut user: User) -> ServiceResult<RotatedSession> {
        let token = self.tokens.issue_session(user.id)?;
        user.bind_session(token.token.clone(), token.expires_at);
        self.store.save_user(&user).await?;

        Ok(RotatedSession { user, token })
    }

    /// [`authenticate`](Self::authenticate) followed by [`rotate`](Self::rotate)
    pub async fn authenticate_and_rotate(&self, token: &str) -> ServiceResult<RotatedSession> {
        let user = self.authenticate(token).await?;
        self.rotate(user).await
    }

    /// Starts a session for a user who just proved their identity
    pub async fn establish(&self, user_id: Uuid) -> ServiceResult<RotatedSession> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        self.rotate(user).await
    }
}
