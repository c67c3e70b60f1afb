use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::TokenKind,
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
    },
    db::is_unique_violation,
    error::{AppError, AppResult},
    state::AppState,
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trim, lowercase and validate an email address.
pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    Ok(email)
}

pub(crate) fn validate_new_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// A registration that passed validation.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> AppResult<Registration> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        let email = normalize_email(&self.email)?;
        validate_new_password(&self.password)?;
        Ok(Registration {
            name,
            email,
            password: self.password,
        })
    }
}

/// Issues and renews credentials.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), JwtKeys::from_ref(state))
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepo>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let registration = request.validate()?;

        if self.users.find_by_email(&registration.email).await?.is_some() {
            warn!(email = %registration.email, "email already registered");
            return Err(AppError::Conflict(
                "a user with this email already exists".into(),
            ));
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self
            .users
            .create(NewUser {
                name: registration.name,
                email: registration.email,
                password_hash,
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("a user with this email already exists".into())
                } else {
                    AppError::Internal(e)
                }
            })?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        self.issue(user)
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let invalid = || AppError::Unauthorized("invalid credentials".into());

        let email = normalize_email(&request.email).map_err(|_| invalid())?;
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(invalid());
        };

        if !verify_password(&request.password, &user.password_hash)? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(invalid());
        }

        info!(user_id = %user.id, "user logged in");
        self.issue(user)
    }

    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self
            .keys
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("user not found".into()))?;

        self.issue(user)
    }

    fn issue(&self, user: User) -> AppResult<AuthResponse> {
        let tokens = self.keys.issue_pair(user.id)?;
        Ok(AuthResponse {
            token: tokens.access,
            refresh_token: tokens.refresh,
            user: user.into(),
        })
    }
}
