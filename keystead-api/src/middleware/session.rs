//! Session rotation middleware
//!
//! Authenticates the bearer token, swaps it for a fresh one before the handler
//! runs and hands the fresh token back in the `x-new-token` response header.
//! The header is attached to every response the handler produces except 401s,
//! so a client that got a 403, 404 or 500 still holds a working session.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use keystead_shared::auth::session::bearer_token;
use keystead_shared::models::User;
use tracing::debug;

use crate::{app::AppState, error::ApiError};

/// Response header carrying the rotated session token
pub const NEW_TOKEN_HEADER: &str = "x-new-token";

/// The caller, as loaded by the session middleware
///
/// `user.session_token` already holds the rotated token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
}

pub async fn session_rotation_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let token = bearer_token(header.as_deref())?;

    let rotated = state.services.sessions.authenticate_and_rotate(token).await?;
    let new_token = HeaderValue::from_str(&rotated.token.token)
        .map_err(|e| ApiError::InternalError(format!("Unencodable session token: {}", e)))?;

    debug!(user_id = %rotated.user.id, "Session rotated");
    req.extensions_mut().insert(AuthenticatedUser { user: rotated.user });

    let mut response = next.run(req).await;
    if response.status() != StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(NEW_TOKEN_HEADER, new_token);
    }

    Ok(response)
}
