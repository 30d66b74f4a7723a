//! Staff account management

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use carectl_core::models::{optional_text, Email, Password, PersonName, Phone};
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, Role};

use super::common::{audit, parse_filter};
use crate::db::{NewUser, User, UserRepo};
use crate::http::auth::hash_password;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: String,
    pub password: String,
    pub phone: Option<String>,
    pub department: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UserFilter {
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// POST /users
async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    user.require(Permission::ManageUsers)?;

    let role = Role::parse(&req.role)?;
    if !user.role.can_manage(role) {
        return Err(ApiError::forbidden(format!(
            "role '{}' cannot create '{}' accounts",
            user.role, role
        )));
    }

    let password = Password::new(&req.password)?;
    let new = NewUser {
        email: Email::new(&req.email)?,
        name: PersonName::new(&req.name)?,
        role,
        password_hash: hash_password(&password)?,
        phone: Phone::optional(req.phone.as_deref())?,
        department: optional_text(req.department.as_deref(), "department", 100)?,
    };

    let created = UserRepo::new(&state.pool).create(new).await?;
    audit(&state, &user, "create", "user", Some(created.id), json!({ "role": role })).await;
    tracing::info!(user_id = %created.id, %role, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /users?role=
async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<UserFilter>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<User>>, ApiError> {
    user.require(Permission::ManageUsers)?;
    let role = parse_filter(filter.role.as_deref(), Role::parse)?;
    let page = Pagination::from(params);
    Ok(Json(UserRepo::new(&state.pool).list(role, page).await?))
}

/// PATCH /users/{id}/active
async fn set_active(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<SetActiveRequest>,
) -> Result<Json<User>, ApiError> {
    user.require(Permission::ManageUsers)?;
    if id == user.id {
        return Err(ApiError::forbidden("cannot change your own account status"));
    }

    let repo = UserRepo::new(&state.pool);
    let target = repo.get(id).await?;
    if !user.role.can_manage(target.role()?) {
        return Err(ApiError::forbidden(format!(
            "role '{}' cannot manage '{}' accounts",
            user.role, target.role
        )));
    }

    let updated = repo.set_active(id, req.is_active).await?;
    audit(
        &state,
        &user,
        if req.is_active { "activate" } else { "deactivate" },
        "user",
        Some(id),
        json!({}),
    )
    .await;
    Ok(Json(updated))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}/active", patch(set_active))
}
