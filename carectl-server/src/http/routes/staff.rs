//! Shift scheduling, check-in/out and leave requests

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use carectl_core::models::{optional_text, required_text};
use carectl_core::staff::{LeaveDecision, LeaveKind, LeaveRange, LeaveStatus, ShiftWindow};
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, ValidationError};

use super::common::{audit, parse_filter};
use crate::db::{LeaveRepo, LeaveRequest, NewLeaveRequest, NewShift, Shift, ShiftRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct ShiftRequest {
    pub staff_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub department: Option<String>,
}

impl ShiftRequest {
    fn validate(self) -> Result<NewShift, ValidationError> {
        Ok(NewShift {
            staff_id: self.staff_id,
            window: ShiftWindow::new(self.starts_at, self.ends_at)?,
            department: optional_text(self.department.as_deref(), "department", 100)?,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct ShiftQuery {
    pub staff_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

/// A shift plus the minutes worked once it is completed.
#[derive(Serialize)]
pub struct ShiftView {
    #[serde(flatten)]
    pub shift: Shift,
    pub worked_minutes: Option<i64>,
}

impl From<Shift> for ShiftView {
    fn from(shift: Shift) -> Self {
        let worked_minutes = shift.worked_minutes();
        Self {
            shift,
            worked_minutes,
        }
    }
}

#[derive(Deserialize)]
pub struct LeaveApplication {
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

impl LeaveApplication {
    fn validate(self, staff_id: Uuid) -> Result<NewLeaveRequest, ValidationError> {
        Ok(NewLeaveRequest {
            staff_id,
            kind: LeaveKind::parse(self.leave_type.trim())?,
            range: LeaveRange::new(self.start_date, self.end_date)?,
            reason: required_text(&self.reason, "reason", 1000)?,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct LeaveQuery {
    pub staff_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
    pub note: Option<String>,
}

/// Managers may filter by anyone; everybody else only sees their own rows.
fn scope_to_caller(user: &AuthUser, requested: Option<Uuid>) -> Option<Uuid> {
    if user.role.allows(Permission::ManageStaff) {
        requested
    } else {
        Some(user.id)
    }
}

/// POST /shifts
async fn schedule_shift(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<ShiftRequest>,
) -> Result<(StatusCode, Json<ShiftView>), ApiError> {
    user.require(Permission::ManageStaff)?;
    let shift = ShiftRepo::new(&state.pool)
        .schedule(req.validate()?, user.id)
        .await?;
    audit(
        &state,
        &user,
        "create",
        "shift",
        Some(shift.id),
        json!({ "staff_id": shift.staff_id, "starts_at": shift.starts_at }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(shift.into())))
}

/// GET /shifts?staff_id=&date=
async fn list_shifts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ShiftQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<ShiftView>>, ApiError> {
    let staff_id = scope_to_caller(&user, query.staff_id);
    let page = Pagination::from(params);
    let shifts = ShiftRepo::new(&state.pool)
        .list(staff_id, query.date, page)
        .await?;
    Ok(Json(shifts.map(ShiftView::from)))
}

/// Load a shift and make sure it belongs to the caller.
async fn own_shift(state: &AppState, user: &AuthUser, id: Uuid) -> Result<Shift, ApiError> {
    let shift = ShiftRepo::new(&state.pool).get(id).await?;
    if shift.staff_id != user.id {
        return Err(ApiError::forbidden("only the assigned staff member can do this"));
    }
    Ok(shift)
}

/// POST /shifts/{id}/check-in
async fn check_in(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ShiftView>, ApiError> {
    own_shift(&state, &user, id).await?;
    let shift = ShiftRepo::new(&state.pool).check_in(id, Utc::now()).await?;
    audit(&state, &user, "check_in", "shift", Some(id), json!({})).await;
    Ok(Json(shift.into()))
}

/// POST /shifts/{id}/check-out
async fn check_out(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ShiftView>, ApiError> {
    own_shift(&state, &user, id).await?;
    let shift = ShiftRepo::new(&state.pool).check_out(id, Utc::now()).await?;
    audit(
        &state,
        &user,
        "check_out",
        "shift",
        Some(id),
        json!({ "worked_minutes": shift.worked_minutes() }),
    )
    .await;
    Ok(Json(shift.into()))
}

/// POST /shifts/{id}/cancel
async fn cancel_shift(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ShiftView>, ApiError> {
    user.require(Permission::ManageStaff)?;
    let shift = ShiftRepo::new(&state.pool).cancel(id).await?;
    audit(&state, &user, "cancel", "shift", Some(id), json!({})).await;
    Ok(Json(shift.into()))
}

/// POST /leave: always filed for the caller
async fn request_leave(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<LeaveApplication>,
) -> Result<(StatusCode, Json<LeaveRequest>), ApiError> {
    if !user.role.is_staff() {
        return Err(ApiError::forbidden("only staff members can request leave"));
    }
    let leave = LeaveRepo::new(&state.pool)
        .request(req.validate(user.id)?)
        .await?;
    audit(
        &state,
        &user,
        "create",
        "leave_request",
        Some(leave.id),
        json!({ "start_date": leave.start_date, "end_date": leave.end_date }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(leave)))
}

/// GET /leave?staff_id=&status=
async fn list_leave(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<LeaveQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<LeaveRequest>>, ApiError> {
    let status = parse_filter(query.status.as_deref(), LeaveStatus::parse)?;
    let staff_id = scope_to_caller(&user, query.staff_id);
    let page = Pagination::from(params);
    Ok(Json(
        LeaveRepo::new(&state.pool)
            .list(staff_id, status, page)
            .await?,
    ))
}

/// POST /leave/{id}/decision
async fn decide_leave(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<DecisionRequest>,
) -> Result<Json<LeaveRequest>, ApiError> {
    user.require(Permission::ManageStaff)?;
    let decision = LeaveDecision::parse(req.decision.trim())?;
    let note = optional_text(req.note.as_deref(), "note", 1000)?;

    let leave = LeaveRepo::new(&state.pool).get(id).await?;
    if leave.staff_id == user.id {
        return Err(ApiError::forbidden("cannot decide your own leave request"));
    }

    let leave = LeaveRepo::new(&state.pool)
        .decide(id, decision, user.id, note.as_deref())
        .await?;
    audit(&state, &user, decision.as_str(), "leave_request", Some(id), json!({ "status": leave.status })).await;
    Ok(Json(leave))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shifts", get(list_shifts).post(schedule_shift))
        .route("/shifts/{id}/check-in", post(check_in))
        .route("/shifts/{id}/check-out", post(check_out))
        .route("/shifts/{id}/cancel", post(cancel_shift))
        .route("/leave", get(list_leave).post(request_leave))
        .route("/leave/{id}/decision", post(decide_leave))
}
