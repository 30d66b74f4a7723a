//! Prescriptions and dispensing

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use carectl_core::models::{optional_text, required_text};
use carectl_core::pharmacy::DispenseStatus;
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, Role, ValidationError};

use super::common::{audit, parse_filter, today};
use crate::db::{
    DispenseLine, NewPrescription, NewPrescriptionItem, Prescription, PrescriptionDetail,
    PrescriptionRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct ItemRequest {
    pub medicine_id: Uuid,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: Option<i32>,
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct PrescriptionRequest {
    pub patient_id: Uuid,
    pub notes: Option<String>,
    pub items: Vec<ItemRequest>,
}

impl PrescriptionRequest {
    fn validate(self, doctor_id: Uuid) -> Result<NewPrescription, ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::Empty { field: "items" });
        }
        let items = self
            .items
            .into_iter()
            .map(|item| {
                if item.quantity <= 0 {
                    return Err(ValidationError::OutOfRange {
                        field: "quantity",
                        reason: "must be greater than zero".into(),
                    });
                }
                if matches!(item.duration_days, Some(d) if d <= 0) {
                    return Err(ValidationError::OutOfRange {
                        field: "duration_days",
                        reason: "must be greater than zero".into(),
                    });
                }
                Ok(NewPrescriptionItem {
                    medicine_id: item.medicine_id,
                    dosage: required_text(&item.dosage, "dosage", 100)?,
                    frequency: required_text(&item.frequency, "frequency", 100)?,
                    duration_days: item.duration_days,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewPrescription {
            patient_id: self.patient_id,
            doctor_id,
            notes: optional_text(self.notes.as_deref(), "notes", 2000)?,
            items,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct PrescriptionQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct DispenseRequest {
    /// Empty dispenses everything outstanding
    #[serde(default)]
    pub items: Vec<DispenseLine>,
}

/// Doctors only read their own prescriptions.
fn check_visible(user: &AuthUser, prescription: &Prescription) -> Result<(), ApiError> {
    user.require(Permission::ViewPrescriptions)?;
    if user.role == Role::Doctor && prescription.doctor_id != user.id {
        return Err(ApiError::forbidden("prescription belongs to another doctor"));
    }
    Ok(())
}

/// POST /prescriptions
async fn create_prescription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<PrescriptionRequest>,
) -> Result<(StatusCode, Json<PrescriptionDetail>), ApiError> {
    user.require(Permission::Prescribe)?;
    let detail = PrescriptionRepo::new(&state.pool)
        .create(req.validate(user.id)?)
        .await?;
    audit(
        &state,
        &user,
        "create",
        "prescription",
        Some(detail.prescription.id),
        json!({ "patient_id": detail.prescription.patient_id, "items": detail.items.len() }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /prescriptions?patient_id=&doctor_id=&status=
async fn list_prescriptions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<PrescriptionQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Prescription>>, ApiError> {
    user.require(Permission::ViewPrescriptions)?;
    let status = parse_filter(query.status.as_deref(), DispenseStatus::parse)?;
    let doctor_id = if user.role == Role::Doctor {
        Some(user.id)
    } else {
        query.doctor_id
    };

    let page = Pagination::from(params);
    Ok(Json(
        PrescriptionRepo::new(&state.pool)
            .list(query.patient_id, doctor_id, status, page)
            .await?,
    ))
}

/// GET /prescriptions/{id}
async fn get_prescription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<PrescriptionDetail>, ApiError> {
    user.require(Permission::ViewPrescriptions)?;
    let detail = PrescriptionRepo::new(&state.pool).get(id).await?;
    check_visible(&user, &detail.prescription)?;
    Ok(Json(detail))
}

/// POST /prescriptions/{id}/dispense
async fn dispense(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<DispenseRequest>,
) -> Result<Json<PrescriptionDetail>, ApiError> {
    user.require(Permission::Dispense)?;
    let detail = PrescriptionRepo::new(&state.pool)
        .dispense(id, &req.items, user.id, today())
        .await?;
    audit(
        &state,
        &user,
        "dispense",
        "prescription",
        Some(id),
        json!({ "lines": req.items.len(), "status": detail.summary.status }),
    )
    .await;
    Ok(Json(detail))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/prescriptions", get(list_prescriptions).post(create_prescription))
        .route("/prescriptions/{id}", get(get_prescription))
        .route("/prescriptions/{id}/dispense", post(dispense))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32) -> ItemRequest {
        ItemRequest {
            medicine_id: Uuid::new_v4(),
            dosage: "500mg".into(),
            frequency: "twice daily".into(),
            duration_days: Some(5),
            quantity,
        }
    }

    #[test]
    fn prescription_needs_items() {
        let req = PrescriptionRequest {
            patient_id: Uuid::new_v4(),
            notes: None,
            items: vec![],
        };
        assert_eq!(
            req.validate(Uuid::new_v4()).unwrap_err(),
            ValidationError::Empty { field: "items" }
        );
    }

    #[test]
    fn prescriber_becomes_doctor() {
        let doctor = Uuid::new_v4();
        let req = PrescriptionRequest {
            patient_id: Uuid::new_v4(),
            notes: Some("  ".into()),
            items: vec![item(10)],
        };
        let new = req.validate(doctor).unwrap();
        assert_eq!(new.doctor_id, doctor);
        assert_eq!(new.notes, None);
        assert_eq!(new.items[0].quantity, 10);
    }

    #[test]
    fn zero_quantity_line_rejected() {
        let req = PrescriptionRequest {
            patient_id: Uuid::new_v4(),
            notes: None,
            items: vec![item(3), item(0)],
        };
        assert!(matches!(
            req.validate(Uuid::new_v4()),
            Err(ValidationError::OutOfRange { field: "quantity", .. })
        ));
    }

    #[test]
    fn dispense_body_defaults_to_everything() {
        let req: DispenseRequest = serde_json::from_str("{}").unwrap();
        assert!(req.items.is_empty());

        let req: DispenseRequest = serde_json::from_value(json!({
            "items": [{ "item_id": Uuid::nil(), "quantity": 2 }]
        }))
        .unwrap();
        assert_eq!(req.items[0].quantity, Some(2));
    }
}
