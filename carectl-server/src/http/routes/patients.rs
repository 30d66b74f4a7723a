//! Patient registration

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use carectl_core::models::{optional_text, Email, PersonName, Phone};
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, ValidationError};

use super::common::{audit, today};
use crate::db::{NewPatient, Patient, PatientRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

const GENDERS: &[&str] = &["male", "female", "other"];
const BLOOD_GROUPS: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Deserialize)]
pub struct PatientRequest {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct PatientSearch {
    /// Matches name or phone
    pub q: Option<String>,
}

fn one_of(value: &str, allowed: &[&'static str], field: &'static str) -> Result<&'static str, ValidationError> {
    let normalized = value.trim();
    allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(normalized))
        .copied()
        .ok_or_else(|| ValidationError::InvalidVariant {
            field,
            value: value.to_owned(),
        })
}

impl PatientRequest {
    fn validate(self) -> Result<NewPatient, ValidationError> {
        if self.date_of_birth > today() {
            return Err(ValidationError::OutOfRange {
                field: "date_of_birth",
                reason: "cannot be in the future".into(),
            });
        }
        Ok(NewPatient {
            name: PersonName::new(&self.name)?,
            date_of_birth: self.date_of_birth,
            gender: one_of(&self.gender, GENDERS, "gender")?,
            phone: Phone::optional(self.phone.as_deref())?,
            email: match self.email.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(e) => Some(Email::new(e)?),
            },
            address: optional_text(self.address.as_deref(), "address", 300)?,
            blood_group: self
                .blood_group
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .map(|b| one_of(b, BLOOD_GROUPS, "blood_group"))
                .transpose()?,
            emergency_contact: optional_text(self.emergency_contact.as_deref(), "emergency_contact", 200)?,
            medical_history: optional_text(self.medical_history.as_deref(), "medical_history", 5000)?,
        })
    }
}

/// POST /patients
async fn create_patient(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<PatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    user.require(Permission::ManagePatients)?;
    let patient = PatientRepo::new(&state.pool)
        .create(req.validate()?, user.id)
        .await?;
    audit(&state, &user, "create", "patient", Some(patient.id), json!({})).await;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /patients?q=
async fn list_patients(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(search): Query<PatientSearch>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Patient>>, ApiError> {
    user.require(Permission::ManagePatients)?;
    let page = Pagination::from(params);
    Ok(Json(
        PatientRepo::new(&state.pool)
            .list(search.q.as_deref(), page)
            .await?,
    ))
}

/// GET /patients/{id}
async fn get_patient(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Patient>, ApiError> {
    user.require(Permission::ManagePatients)?;
    Ok(Json(PatientRepo::new(&state.pool).get(id).await?))
}

/// PUT /patients/{id}
async fn update_patient(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<PatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    user.require(Permission::ManagePatients)?;
    let patient = PatientRepo::new(&state.pool)
        .update(id, req.validate()?)
        .await?;
    audit(&state, &user, "update", "patient", Some(id), json!({})).await;
    Ok(Json(patient))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/{id}", get(get_patient).put(update_patient))
}
