//! Account role resolution and tier gates
//!
//! [`resolve_account_role_layer`] finds the caller's role in the targeted
//! account and caches it as an [`AccountRole`] extension. The gate functions
//! only read that extension. Gated routers apply both with `route_layer`, the
//! resolver outermost:
//!
//! ```text
//! .route_layer(from_fn(require_owner))
//! .route_layer(from_fn_with_state(state, resolve_account_role_layer))
//! ```
//!
//! Routes with an `:account_id` segment are resolved from the path. Routes
//! without one fall back to an `accountId` field in the JSON body; the body is
//! buffered and handed on unchanged, so the handler can still extract it. None
//! of the built-in routes are body-scoped, the fallback serves gated routes that
//! name their account only in the payload.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use keystead_shared::auth::authorization::{
    account_id_from_request, resolve_account_role, AccountRole, RoleGate, ACCOUNT_ID_PARAM,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::{app::AppState, error::ApiError, middleware::session::AuthenticatedUser};

/// Largest body buffered while looking for an `accountId` field
const MAX_BUFFERED_BODY: usize = 64 * 1024;

pub async fn resolve_account_role_layer(
    State(state): State<AppState>,
    path: Option<Path<HashMap<String, String>>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|caller| caller.user.id)
        .ok_or_else(|| {
            ApiError::InternalError("Role resolution ran without an authenticated user".to_string())
        })?;

    let path_value = path.and_then(|Path(mut params)| params.remove(ACCOUNT_ID_PARAM));

    let (account_id, mut req) = match path_value {
        Some(raw) => (account_id_from_request(Some(&raw), None)?, req),
        None => {
            let (parts, body) = req.into_parts();
            let bytes = axum::body::to_bytes(body, MAX_BUFFERED_BODY)
                .await
                .map_err(|_| ApiError::BadRequest("Request body too large".to_string()))?;
            let json = serde_json::from_slice::<Value>(&bytes).ok();
            let account_id = account_id_from_request(None, json.as_ref())?;
            (account_id, Request::from_parts(parts, Body::from(bytes)))
        }
    };

    let role = resolve_account_role(state.services.store.as_ref(), user_id, account_id).await?;
    debug!(%user_id, %account_id, tier = role.tier, "Account role resolved");
    req.extensions_mut().insert(role);

    Ok(next.run(req).await)
}

async fn gate(gate: RoleGate, req: Request, next: Next) -> Result<Response, ApiError> {
    gate.check(req.extensions().get::<AccountRole>())?;
    Ok(next.run(req).await)
}

/// Tier 0 only
pub async fn require_owner(req: Request, next: Next) -> Result<Response, ApiError> {
    gate(RoleGate::Owner, req, next).await
}

/// Tier 1 or better
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    gate(RoleGate::Admin, req, next).await
}

/// Any known tier
pub async fn require_member(req: Request, next: Next) -> Result<Response, ApiError> {
    gate(RoleGate::Member, req, next).await
}
