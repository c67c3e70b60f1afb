use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::AppResult,
    extract::Json,
    state::AppState,
    users::{
        dto::{ChangePasswordRequest, PublicUser, UpdateProfileRequest},
        services::UserService,
    },
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/me/password", put(change_password))
}

#[instrument(skip(users))]
pub async fn get_me(
    State(users): State<UserService>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(users.find_user(user_id).await?.into()))
}

#[instrument(skip(users, payload))]
pub async fn update_me(
    State(users): State<UserService>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(users.update_profile(user_id, payload).await?.into()))
}

#[instrument(skip(users, payload))]
pub async fn change_password(
    State(users): State<UserService>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    users.change_password(user_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
