//! Authentication endpoints
//!
//! Login is a two-step exchange: a password check that emails a one-time
//! code, then the code for a session token. Signup takes three steps: email,
//! code, then account details.
//!
//! # Endpoints
//!
//! - `POST /api/v1/auth/login`
//! - `POST /api/v1/auth/verify`: returns `x-new-token`
//! - `POST /api/v1/auth/signup/email`
//! - `POST /api/v1/auth/signup/verify`: returns `x-signup-token`
//! - `POST /api/v1/auth/signup/account`: takes `x-signup-token`, returns `x-new-token`
//!
//! Tokens travel in headers only, never in a response body.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use keystead_shared::{models::AccountData, services::signup::CompleteAccount};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::NEW_TOKEN_HEADER,
    routes::profile::ProfileResponse,
};

/// Request and response header carrying the signup token
pub const SIGNUP_TOKEN_HEADER: &str = "x-signup-token";

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body of both code verification steps
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub code: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupAccountRequest {
    #[validate(length(min = 1, max = 200, message = "Account title must be 1-200 characters"))]
    pub account_title: String,

    #[validate(length(max = 2000, message = "Account description must be at most 2000 characters"))]
    pub account_description: Option<String>,

    pub user_password: String,

    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub user_first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub user_last_name: String,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub user_phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Checks the password and emails a login code
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email, unfinished signup or wrong password
/// - `422 Unprocessable Entity`: validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<StatusCode> {
    payload.validate()?;

    state
        .services
        .login
        .login(&payload.email, &payload.password)
        .await?;

    Ok(StatusCode::OK)
}

/// Exchanges a login code for the first session token
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;

    let session = state
        .services
        .login
        .verify(&payload.email, payload.code)
        .await?;

    Ok((
        [(NEW_TOKEN_HEADER, session.token.token)],
        Json(ProfileResponse::from(session.user)),
    ))
}

/// Starts signup and emails a signup code
///
/// # Errors
///
/// - `409 Conflict`: the email belongs to an active user
pub async fn signup_email(
    State(state): State<AppState>,
    Json(payload): Json<SignupEmailRequest>,
) -> ApiResult<StatusCode> {
    payload.validate()?;

    state.services.signup.initiate(&payload.email).await?;

    Ok(StatusCode::OK)
}

/// Exchanges a signup code for a signup token
pub async fn signup_verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;

    let token = state
        .services
        .signup
        .verify_code(&payload.email, payload.code)
        .await?;

    Ok((StatusCode::OK, [(SIGNUP_TOKEN_HEADER, token.token)]))
}

/// Creates the account and activates the user
///
/// # Errors
///
/// - `400 Bad Request`: weak password
/// - `401 Unauthorized`: missing, invalid or expired signup token
/// - `404 Not Found`: the token names no pending signup
pub async fn signup_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignupAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    let signup_token = headers
        .get(SIGNUP_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing signup token".to_string()))?
        .to_string();

    payload.validate()?;

    let outcome = state
        .services
        .signup
        .complete_account(
            &signup_token,
            CompleteAccount {
                account: AccountData {
                    title: payload.account_title,
                    description: payload.account_description,
                },
                password: payload.user_password,
                first_name: payload.user_first_name,
                last_name: payload.user_last_name,
                phone: payload.user_phone_number,
            },
        )
        .await?;

    let user = outcome.session.user;
    let body = SignupResponse {
        account_id: outcome.account_id,
        user_id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
    };

    Ok((
        StatusCode::CREATED,
        [(NEW_TOKEN_HEADER, outcome.session.token.token)],
        Json(body),
    ))
}
