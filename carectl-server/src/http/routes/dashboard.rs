//! Role-specific dashboard

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::common::today;
use crate::db::{DashboardRepo, DashboardSummary};
use crate::http::error::ApiError;
use crate::http::extractors::AuthUser;
use crate::http::server::AppState;

/// GET /dashboard
async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<DashboardSummary>, ApiError> {
    let summary = DashboardRepo::new(&state.pool)
        .summary(user.role, user.id, today(), state.expiry_window_days)
        .await?;
    Ok(Json(summary))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(dashboard))
}
