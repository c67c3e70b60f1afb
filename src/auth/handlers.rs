use axum::{extract::State, http::StatusCode, routing::post, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        services::AuthService,
    },
    error::AppResult,
    extract::Json,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

#[instrument(skip(auth, payload))]
pub async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let response = auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    Ok(Json(auth.login(payload).await?))
}

#[instrument(skip(auth, payload))]
pub async fn refresh(
    State(auth): State<AuthService>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    Ok(Json(auth.refresh(&payload.refresh_token).await?))
}
