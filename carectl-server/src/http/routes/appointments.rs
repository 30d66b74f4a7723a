//! Appointment booking

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use carectl_core::appointments::{AppointmentStatus, Slot};
use carectl_core::models::optional_text;
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, Role};

use super::common::{audit, parse_filter};
use crate::db::{Appointment, AppointmentFilter, AppointmentRepo, NewAppointment};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct BookRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: Option<i32>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct AppointmentQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

/// POST /appointments
async fn book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<BookRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    user.require(Permission::ManageAppointments)?;

    let slot = Slot::new(req.date, req.time, req.duration_minutes, Utc::now().naive_utc())?;
    let new = NewAppointment {
        patient_id: req.patient_id,
        doctor_id: req.doctor_id,
        slot,
        reason: optional_text(req.reason.as_deref(), "reason", 500)?,
        notes: optional_text(req.notes.as_deref(), "notes", 2000)?,
    };

    let appointment = AppointmentRepo::new(&state.pool).book(new, user.id).await?;
    audit(
        &state,
        &user,
        "create",
        "appointment",
        Some(appointment.id),
        json!({ "doctor_id": appointment.doctor_id, "date": appointment.appointment_date }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// GET /appointments?doctor_id=&patient_id=&date=&status=
///
/// Doctors only see their own calendar.
async fn list_appointments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AppointmentQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Appointment>>, ApiError> {
    user.require(Permission::ManageAppointments)?;

    let filter = AppointmentFilter {
        doctor_id: if user.role == Role::Doctor {
            Some(user.id)
        } else {
            query.doctor_id
        },
        patient_id: query.patient_id,
        date: query.date,
        status: parse_filter(query.status.as_deref(), AppointmentStatus::parse)?,
    };
    let page = Pagination::from(params);
    Ok(Json(AppointmentRepo::new(&state.pool).list(&filter, page).await?))
}

/// GET /appointments/{id}
async fn get_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Appointment>, ApiError> {
    user.require(Permission::ManageAppointments)?;
    let appointment = AppointmentRepo::new(&state.pool).get(id).await?;
    if user.role == Role::Doctor && appointment.doctor_id != user.id {
        return Err(ApiError::forbidden("not your appointment"));
    }
    Ok(Json(appointment))
}

/// PATCH /appointments/{id}/status
async fn update_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<Appointment>, ApiError> {
    user.require(Permission::ManageAppointments)?;
    let to = AppointmentStatus::parse(&req.status)?;
    let notes = optional_text(req.notes.as_deref(), "notes", 2000)?;

    let repo = AppointmentRepo::new(&state.pool);
    if user.role == Role::Doctor && repo.get(id).await?.doctor_id != user.id {
        return Err(ApiError::forbidden("not your appointment"));
    }

    let appointment = repo.update_status(id, to, notes.as_deref()).await?;
    audit(&state, &user, "update_status", "appointment", Some(id), json!({ "status": to })).await;
    Ok(Json(appointment))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/appointments", get(list_appointments).post(book))
        .route("/appointments/{id}", get(get_appointment))
        .route("/appointments/{id}/status", patch(update_status))
}
