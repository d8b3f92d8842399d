//! Domain error taxonomy
//!
//! Every service operation fails with a [`ServiceError`]. Component errors
//! convert into it, so services use `?` throughout. The HTTP layer maps each
//! variant to one status code.
//!
//! Messages of `Unauthenticated`, `Forbidden`, `NotFound`, `Conflict` and
//! `BadRequest` are safe to show to clients. `Internal` carries diagnostic detail
//! that must only be logged.

use crate::auth::authorization::AuthzError;
use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;
use crate::crypto::CryptoError;
use crate::email::EmailError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Conflict(what) => ServiceError::Conflict(what),
            StoreError::Unexpected(err) => ServiceError::Internal(format!("store: {:#}", err)),
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ServiceError::Unauthenticated("Token expired".to_string()),
            TokenError::Invalid(_) => ServiceError::Unauthenticated("Invalid token".to_string()),
            TokenError::CreateError(reason) => ServiceError::Internal(reason),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(reason) => ServiceError::BadRequest(reason),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<CryptoError> for ServiceError {
    fn from(err: CryptoError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<EmailError> for ServiceError {
    fn from(err: EmailError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InvalidAccountId | AuthzError::MissingAccountId => {
                ServiceError::BadRequest(err.to_string())
            }
            AuthzError::NoRole { .. } | AuthzError::InsufficientTier(_) => {
                ServiceError::Forbidden(err.to_string())
            }
            AuthzError::RoleNotResolved(_) => ServiceError::Internal(err.to_string()),
            AuthzError::Store(err) => err.into(),
        }
    }
}
