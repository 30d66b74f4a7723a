//! Login and current-user endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use carectl_core::models::Email;
use carectl_core::Role;

use super::common::audit;
use crate::db::error::stored;
use crate::db::{User, UserRepo};
use crate::http::auth::{verify_password, AuthError};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

#[derive(Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = Email::new(&req.email)?;

    let creds = UserRepo::new(&state.pool)
        .find_credentials(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(&req.password, &creds.password_hash) {
        tracing::info!(user_id = %creds.id, "login failed: wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }
    if !creds.is_active {
        return Err(AuthError::Inactive.into());
    }

    let role = stored(Role::parse(&creds.role))?;
    let (token, expires_at) = state.keys.issue(creds.id, role)?;

    let actor = AuthUser { id: creds.id, role };
    audit(&state, &actor, "login", "user", Some(creds.id), json!({})).await;
    tracing::info!(user_id = %creds.id, %role, "user logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_at,
        user: SessionUser {
            id: creds.id,
            name: creds.name,
            role,
        },
    }))
}

/// GET /auth/me
async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<User>, ApiError> {
    Ok(Json(UserRepo::new(&state.pool).get(user.id).await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}
