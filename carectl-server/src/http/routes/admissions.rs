//! Rooms, admissions and discharge

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use carectl_core::admissions::RoomKind;
use carectl_core::models::{optional_text, required_text};
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, ValidationError};

use super::common::audit;
use crate::db::{Admission, AdmissionRepo, NewAdmission, NewRoom, Room, RoomRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct RoomRequest {
    pub room_number: String,
    pub room_type: String,
    pub capacity: i32,
    #[serde(default)]
    pub daily_rate_cents: i64,
}

impl RoomRequest {
    fn validate(self) -> Result<NewRoom, ValidationError> {
        if self.daily_rate_cents < 0 {
            return Err(ValidationError::OutOfRange {
                field: "daily_rate_cents",
                reason: "cannot be negative".into(),
            });
        }
        Ok(NewRoom {
            room_number: required_text(&self.room_number, "room_number", 20)?,
            kind: RoomKind::parse(self.room_type.trim())?,
            capacity: self.capacity,
            daily_rate_cents: self.daily_rate_cents,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct RoomQuery {
    #[serde(default)]
    pub available: bool,
}

#[derive(Deserialize)]
pub struct MaintenanceRequest {
    pub maintenance: bool,
}

#[derive(Deserialize)]
pub struct AdmitRequest {
    pub patient_id: Uuid,
    pub room_id: Uuid,
    pub doctor_id: Uuid,
    pub reason: String,
}

#[derive(Deserialize, Default)]
pub struct AdmissionQuery {
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Deserialize, Default)]
pub struct DischargeRequest {
    pub notes: Option<String>,
}

/// POST /rooms
async fn create_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<RoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    user.require(Permission::ManageAdmissions)?;
    let room = RoomRepo::new(&state.pool).create(req.validate()?).await?;
    audit(&state, &user, "create", "room", Some(room.id), json!({ "room_number": room.room_number })).await;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /rooms?available=
async fn list_rooms(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    user.require(Permission::ManageAdmissions)?;
    Ok(Json(RoomRepo::new(&state.pool).list(query.available).await?))
}

/// PATCH /rooms/{id}/maintenance
async fn set_maintenance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<MaintenanceRequest>,
) -> Result<Json<Room>, ApiError> {
    user.require(Permission::ManageAdmissions)?;
    let room = RoomRepo::new(&state.pool)
        .set_maintenance(id, req.maintenance)
        .await?;
    audit(&state, &user, "maintenance", "room", Some(id), json!({ "maintenance": req.maintenance })).await;
    Ok(Json(room))
}

/// POST /admissions
async fn admit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<AdmitRequest>,
) -> Result<(StatusCode, Json<Admission>), ApiError> {
    user.require(Permission::ManageAdmissions)?;
    let new = NewAdmission {
        patient_id: req.patient_id,
        room_id: req.room_id,
        doctor_id: req.doctor_id,
        reason: required_text(&req.reason, "reason", 1000)?,
    };

    let admission = AdmissionRepo::new(&state.pool).admit(new, user.id).await?;
    audit(
        &state,
        &user,
        "admit",
        "admission",
        Some(admission.id),
        json!({ "patient_id": admission.patient_id, "room_id": admission.room_id }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(admission)))
}

/// GET /admissions?patient_id=&active=
async fn list_admissions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AdmissionQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Admission>>, ApiError> {
    user.require(Permission::ManageAdmissions)?;
    let page = Pagination::from(params);
    Ok(Json(
        AdmissionRepo::new(&state.pool)
            .list(query.active, query.patient_id, page)
            .await?,
    ))
}

/// GET /admissions/{id}
async fn get_admission(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Admission>, ApiError> {
    user.require(Permission::ManageAdmissions)?;
    Ok(Json(AdmissionRepo::new(&state.pool).get(id).await?))
}

/// POST /admissions/{id}/discharge
async fn discharge(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<DischargeRequest>,
) -> Result<Json<Admission>, ApiError> {
    user.require(Permission::ManageAdmissions)?;
    let notes = optional_text(req.notes.as_deref(), "notes", 2000)?;
    let admission = AdmissionRepo::new(&state.pool)
        .discharge(id, notes.as_deref(), Utc::now())
        .await?;
    audit(&state, &user, "discharge", "admission", Some(id), json!({ "room_id": admission.room_id })).await;
    Ok(Json(admission))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}/maintenance", patch(set_maintenance))
        .route("/admissions", get(list_admissions).post(admit))
        .route("/admissions/{id}", get(get_admission))
        .route("/admissions/{id}/discharge", post(discharge))
}
