//! Account endpoints
//!
//! Every handler here runs behind session rotation and an account role gate;
//! see [`build_router`](crate::app::build_router) for which gate guards which
//! route.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use keystead_shared::{
    models::{AccountData, AccountMember, AgentUser},
    services::accounts::{AccountRoster, AccountView, AddedMember},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{app::AppState, error::ApiResult, middleware::session::AuthenticatedUser};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub data: AccountData,
    pub date_created: DateTime<Utc>,
    pub date_last_updated: DateTime<Utc>,
}

impl From<AccountView> for AccountResponse {
    fn from(view: AccountView) -> Self {
        Self {
            id: view.id,
            data: view.data,
            date_created: view.created_at,
            date_last_updated: view.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: i16,
    pub date_created: DateTime<Utc>,
}

impl From<AccountMember> for AccountUserResponse {
    fn from(member: AccountMember) -> Self {
        Self {
            user_id: member.user_id,
            email: member.email,
            first_name: member.first_name,
            last_name: member.last_name,
            role: member.tier,
            date_created: member.created_at,
        }
    }
}

/// An invitation for an email without a user yet
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAccountUserResponse {
    pub email: String,
    pub role: i16,
    pub date_created: DateTime<Utc>,
}

impl From<AgentUser> for PendingAccountUserResponse {
    fn from(agent: AgentUser) -> Self {
        Self {
            email: agent.email,
            role: agent.tier,
            date_created: agent.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUsersResponse {
    pub users: Vec<AccountUserResponse>,
    pub pending_invitations: Vec<PendingAccountUserResponse>,
}

impl From<AccountRoster> for AccountUsersResponse {
    fn from(roster: AccountRoster) -> Self {
        Self {
            users: roster.members.into_iter().map(Into::into).collect(),
            pending_invitations: roster.pending.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAccountResponse {
    #[serde(flatten)]
    pub account: AccountResponse,

    #[serde(flatten)]
    pub users: AccountUsersResponse,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// 1 (admin) or 2 (member)
    pub role: i16,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserResponse {
    pub email: String,
    pub role: i16,

    /// `true` when no user had the email and an invitation was created
    pub pending: bool,

    pub date_created: DateTime<Utc>,
}

/// `GET /api/v1/accounts/:account_id`, member gate
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<AccountResponse>> {
    let view = state.services.accounts.get_account(account_id).await?;
    Ok(Json(view.into()))
}

/// `GET /api/v1/accounts/:account_id/full`, admin gate
pub async fn get_detailed_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<DetailedAccountResponse>> {
    let detailed = state
        .services
        .accounts
        .get_detailed_account(account_id)
        .await?;

    Ok(Json(DetailedAccountResponse {
        account: detailed.account.into(),
        users: detailed.roster.into(),
    }))
}

/// `PUT /api/v1/accounts/:account_id`, owner gate
pub async fn update_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<UpdateAccountRequest>,
) -> ApiResult<Json<AccountResponse>> {
    payload.validate()?;

    let view = state
        .services
        .accounts
        .update_account(
            account_id,
            AccountData {
                title: payload.title,
                description: payload.description,
            },
        )
        .await?;

    Ok(Json(view.into()))
}

/// `GET /api/v1/accounts/:account_id/users`, owner gate
pub async fn list_users(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<AccountUsersResponse>> {
    let roster = state.services.accounts.list_users(account_id).await?;
    Ok(Json(roster.into()))
}

/// `POST /api/v1/accounts/:account_id/users`, owner gate
///
/// # Errors
///
/// - `400 Bad Request`: role is not 1 or 2
/// - `409 Conflict`: already a member or already invited
pub async fn add_user(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Extension(caller): Extension<AuthenticatedUser>,
    Json(payload): Json<AddUserRequest>,
) -> ApiResult<(StatusCode, Json<AddUserResponse>)> {
    payload.validate()?;

    let added = state
        .services
        .accounts
        .add_user(account_id, &caller.user, &payload.email, payload.role)
        .await?;

    let response = match added {
        AddedMember::Member(role) => AddUserResponse {
            email: payload.email,
            role: role.tier,
            pending: false,
            date_created: role.created_at,
        },
        AddedMember::Invited(agent) => AddUserResponse {
            email: agent.email,
            role: agent.tier,
            pending: true,
            date_created: agent.created_at,
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// `DELETE /api/v1/accounts/:account_id/users/:user_id`, owner gate
pub async fn remove_user(
    State(state): State<AppState>,
    Path((account_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .services
        .accounts
        .remove_user(account_id, user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
