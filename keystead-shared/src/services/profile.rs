//! The caller's own profile

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::User;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn Store>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Replaces the name and phone fields
    ///
    /// The user is re-read first so a session token rotated earlier in the same
    /// request is not overwritten.
    pub async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> ServiceResult<User> {
        let mut user = self.get(user_id).await?;
        user.first_name = update.first_name;
        user.last_name = update.last_name;
        user.phone = update.phone;
        user.updated_at = Utc::now();
        self.store.save_user(&user).await?;
        Ok(user)
    }
}
