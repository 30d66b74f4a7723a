//! Audit log browsing

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use carectl_core::{Paginated, Pagination, PaginationParams, Permission};

use crate::db::{AuditEntry, AuditRepo};
use crate::http::error::ApiError;
use crate::http::extractors::AuthUser;
use crate::http::server::AppState;

#[derive(Deserialize, Default)]
pub struct AuditQuery {
    pub entity: Option<String>,
    pub actor_id: Option<Uuid>,
}

/// GET /audit?entity=&actor_id=
async fn list_audit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AuditQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<AuditEntry>>, ApiError> {
    user.require(Permission::ViewAudit)?;
    let entity = query
        .entity
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    let page = Pagination::from(params);
    Ok(Json(
        AuditRepo::new(&state.pool)
            .list(entity, query.actor_id, page)
            .await?,
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/audit", get(list_audit))
}
