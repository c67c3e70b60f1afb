use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password, verify_password},
        services::{normalize_email, validate_new_password},
    },
    db::is_unique_violation,
    error::{AppError, AppResult},
    state::AppState,
    users::{
        dto::{ChangePasswordRequest, UpdateProfileRequest},
        repo::UserRepo,
        repo_types::User,
    },
};

/// Profile reads and the two flows allowed to change a user record.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepo>,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone())
    }
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepo>) -> Self {
        Self { users }
    }

    pub async fn find_user(&self, id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, id: Uuid, patch: UpdateProfileRequest) -> AppResult<User> {
        let mut user = self.find_user(id).await?;

        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation("name cannot be empty".into()));
            }
            user.name = name.to_string();
        }

        if let Some(email) = patch.email {
            let email = normalize_email(&email)?;
            if email != user.email {
                if let Some(other) = self.users.find_by_email(&email).await? {
                    warn!(user_id = %id, other_id = %other.id, "email already taken");
                    return Err(AppError::Conflict("email already registered".into()));
                }
                user.email = email;
            }
        }

        let user = self.users.update(&user).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("email already registered".into())
            } else {
                AppError::Internal(e)
            }
        })?;
        info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(&self, id: Uuid, request: ChangePasswordRequest) -> AppResult<()> {
        let mut user = self.find_user(id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            warn!(user_id = %id, "password change with wrong current password");
            return Err(AppError::Unauthorized("current password is incorrect".into()));
        }
        validate_new_password(&request.new_password)?;

        user.password_hash = hash_password(&request.new_password)?;
        self.users.update(&user).await?;
        info!(user_id = %id, "password changed");
        Ok(())
    }
}
