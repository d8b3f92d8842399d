//! Profile endpoints
//!
//! - `GET /api/v1/profile`
//! - `PUT /api/v1/profile`

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use keystead_shared::{models::User, services::profile::ProfileUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{app::AppState, error::ApiResult, middleware::session::AuthenticatedUser};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_last_updated: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            date_created: user.created_at,
            date_last_updated: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> ApiResult<Json<ProfileResponse>> {
    let user = state.services.profile.get(caller.user.id).await?;
    Ok(Json(user.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    payload.validate()?;

    let user = state
        .services
        .profile
        .update(
            caller.user.id,
            ProfileUpdate {
                first_name: payload.first_name,
                last_name: payload.last_name,
                phone: payload.phone,
            },
        )
        .await?;

    Ok(Json(user.into()))
}
