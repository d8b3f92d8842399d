//! Signed, time-boxed tokens for sessions and signup
//!
//! Tokens are JWTs signed with HS256 using a shared secret. Two kinds exist:
//!
//! - **Session token**: subject is the user id, valid for 600 seconds. The most
//!   recently issued one is also stored on the user row; only that one is accepted.
//! - **Signup token**: subject is the provisional user id plus an `email` claim,
//!   valid for 1800 seconds. Authorizes the final signup step only.
//!
//! Every token carries a random `jti`, so two tokens issued within the same
//! second still differ. Expiration is checked with zero leeway. Tokens carry no
//! account or tier information; authorization is always looked up per request.
//!
//! # Example
//!
//! ```
//! use keystead_shared::auth::jwt::TokenIssuer;
//! use uuid::Uuid;
//!
//! let issuer = TokenIssuer::new("an-example-secret-that-is-32-bytes!");
//! let user_id = Uuid::new_v4();
//!
//! let issued = issuer.issue_session(user_id).unwrap();
//! let claims = issuer.validate_session(&issued.token).unwrap();
//! assert_eq!(claims.sub, user_id);
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `iss` claim on every token
pub const ISSUER: &str = "keystead";

/// Lifetime of a session token in seconds
pub const SESSION_TOKEN_TTL_SECS: i64 = 600;

/// Lifetime of a signup token in seconds
pub const SIGNUP_TOKEN_TTL_SECS: i64 = 1800;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Bad signature, malformed token, wrong issuer or wrong token kind
    #[error("Token is invalid: {0}")]
    Invalid(String),

    #[error("Token has expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Session,
    Signup,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Session => Duration::seconds(SESSION_TOKEN_TTL_SECS),
            TokenType::Signup => Duration::seconds(SIGNUP_TOKEN_TTL_SECS),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Session => "session",
            TokenType::Signup => "signup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: Uuid,

    pub iss: String,

    /// Issued at (Unix seconds)
    pub iat: i64,

    /// Expiration (Unix seconds)
    pub exp: i64,

    /// Unique token id
    pub jti: Uuid,

    /// Email the signup flow was started with; signup tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims for a session token with the default lifetime
    pub fn session(user_id: Uuid) -> Self {
        Self::with_expiration(user_id, None, TokenType::Session, TokenType::Session.default_expiration())
    }

    /// Claims for a signup token with the default lifetime
    pub fn signup(user_id: Uuid, email: impl Into<String>) -> Self {
        Self::with_expiration(
            user_id,
            Some(email.into()),
            TokenType::Signup,
            TokenType::Signup.default_expiration(),
        )
    }

    pub fn with_expiration(
        user_id: Uuid,
        email: Option<String>,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            jti: Uuid::new_v4(),
            email,
            token_type,
        }
    }

    /// Expiration as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly signed token with its expiration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and validates tokens with one shared secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_session(&self, user_id: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue(&Claims::session(user_id))
    }

    pub fn issue_signup(&self, user_id: Uuid, email: &str) -> Result<IssuedToken, TokenError> {
        self.issue(&Claims::signup(user_id, email))
    }

    /// Signs arbitrary claims
    pub fn issue(&self, claims: &Claims) -> Result<IssuedToken, TokenError> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::CreateError(format!("Token encoding failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    pub fn validate_session(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_kind(token, TokenType::Session)
    }

    /// Validates a signup token; the `email` claim is guaranteed present
    pub fn validate_signup(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.validate_kind(token, TokenType::Signup)?;
        if claims.email.is_none() {
            return Err(TokenError::Invalid("Signup token without email".to_string()));
        }
        Ok(claims)
    }

    /// Checks signature, issuer and expiration
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(format!("Token validation failed: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }

    fn validate_kind(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;

        if claims.token_type != expected {
            return Err(TokenError::Invalid(format!(
                "Expected {} token, got {} token",
                expected.as_str(),
                claims.token_type.as_str()
            )));
        }

        Ok(claims)
    }
}
