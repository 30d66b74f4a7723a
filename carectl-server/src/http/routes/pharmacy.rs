//! Medicine catalogue, stock movements and alerts

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use carectl_core::models::{optional_text, required_text};
use carectl_core::pharmacy::{collect_alerts, Alert, AlertSeverity, Direction, StockMovement, TransactionType};
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, ValidationError};

use super::common::{audit, today};
use crate::db::{
    BatchRow, Medicine, MedicineRepo, MedicineUpdate, NewMedicine, NewStockTransaction, StockRepo,
    StockTransaction,
};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct MedicineRequest {
    pub name: String,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub unit: Option<String>,
    pub unit_price_cents: i64,
    pub reorder_level: Option<i32>,
    pub vendor_id: Option<Uuid>,
}

fn non_negative<T: PartialOrd + Default>(value: T, field: &'static str) -> Result<T, ValidationError> {
    if value < T::default() {
        return Err(ValidationError::OutOfRange {
            field,
            reason: "cannot be negative".into(),
        });
    }
    Ok(value)
}

impl MedicineRequest {
    fn validate(self) -> Result<NewMedicine, ValidationError> {
        Ok(NewMedicine {
            name: required_text(&self.name, "name", 200)?,
            generic_name: optional_text(self.generic_name.as_deref(), "generic_name", 200)?,
            category: optional_text(self.category.as_deref(), "category", 100)?,
            manufacturer: optional_text(self.manufacturer.as_deref(), "manufacturer", 200)?,
            unit: optional_text(self.unit.as_deref(), "unit", 30)?.unwrap_or_else(|| "unit".into()),
            unit_price_cents: non_negative(self.unit_price_cents, "unit_price_cents")?,
            reorder_level: non_negative(self.reorder_level.unwrap_or(10), "reorder_level")?,
            vendor_id: self.vendor_id,
        })
    }
}

#[derive(Deserialize)]
pub struct MedicineUpdateRequest {
    pub category: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub reorder_level: Option<i32>,
    pub vendor_id: Option<Uuid>,
}

impl MedicineUpdateRequest {
    fn validate(self) -> Result<MedicineUpdate, ValidationError> {
        Ok(MedicineUpdate {
            category: optional_text(self.category.as_deref(), "category", 100)?,
            unit_price_cents: self
                .unit_price_cents
                .map(|v| non_negative(v, "unit_price_cents"))
                .transpose()?,
            reorder_level: self
                .reorder_level
                .map(|v| non_negative(v, "reorder_level"))
                .transpose()?,
            vendor_id: self.vendor_id,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct MedicineQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub transaction_type: String,
    pub quantity: i32,
    pub direction: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub reference: Option<String>,
}

impl TransactionRequest {
    fn validate(self, medicine_id: Uuid, performed_by: Uuid) -> Result<NewStockTransaction, ValidationError> {
        let kind = TransactionType::parse(&self.transaction_type)?;
        let direction = self.direction.as_deref().map(Direction::parse).transpose()?;
        Ok(NewStockTransaction {
            medicine_id,
            movement: StockMovement::new(kind, self.quantity, direction)?,
            batch_number: optional_text(self.batch_number.as_deref(), "batch_number", 50)?,
            expiry_date: self.expiry_date,
            reference: optional_text(self.reference.as_deref(), "reference", 200)?,
            performed_by,
        })
    }
}

#[derive(Serialize)]
pub struct AlertReport {
    pub generated_on: NaiveDate,
    pub expiry_window_days: u32,
    pub critical: usize,
    pub warning: usize,
    pub alerts: Vec<Alert>,
}

/// POST /medicines
async fn create_medicine(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<MedicineRequest>,
) -> Result<(StatusCode, Json<Medicine>), ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let medicine = MedicineRepo::new(&state.pool).create(req.validate()?).await?;
    audit(&state, &user, "create", "medicine", Some(medicine.id), json!({ "name": medicine.name })).await;
    Ok((StatusCode::CREATED, Json(medicine)))
}

/// GET /medicines?q=&low_stock=
///
/// Readable by every role so prescribers can see availability.
async fn list_medicines(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<MedicineQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Medicine>>, ApiError> {
    let page = Pagination::from(params);
    Ok(Json(
        MedicineRepo::new(&state.pool)
            .list(query.q.as_deref(), query.low_stock, page)
            .await?,
    ))
}

/// GET /medicines/{id}
async fn get_medicine(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Medicine>, ApiError> {
    Ok(Json(MedicineRepo::new(&state.pool).get(id).await?))
}

/// PATCH /medicines/{id}: stock is never edited here, only through
/// transactions
async fn update_medicine(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<MedicineUpdateRequest>,
) -> Result<Json<Medicine>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let medicine = MedicineRepo::new(&state.pool).update(id, req.validate()?).await?;
    audit(&state, &user, "update", "medicine", Some(id), json!({})).await;
    Ok(Json(medicine))
}

/// POST /medicines/{id}/transactions
async fn record_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<TransactionRequest>,
) -> Result<(StatusCode, Json<Vec<StockTransaction>>), ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let new = req.validate(id, user.id)?;
    let details = json!({
        "transaction_type": new.movement.kind(),
        "direction": new.movement.direction(),
        "quantity": new.movement.quantity(),
        "batch_number": new.batch_number,
    });

    let rows = StockRepo::new(&state.pool)
        .record_transaction(new, today())
        .await?;
    audit(&state, &user, "stock_transaction", "medicine", Some(id), details).await;
    Ok((StatusCode::CREATED, Json(rows)))
}

/// GET /medicines/{id}/transactions
async fn transaction_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<StockTransaction>>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    // 404 for an unknown medicine instead of an empty page
    MedicineRepo::new(&state.pool).get(id).await?;
    let page = Pagination::from(params);
    Ok(Json(StockRepo::new(&state.pool).history(id, page).await?))
}

/// GET /medicines/{id}/batches
async fn list_batches(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Vec<BatchRow>>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    MedicineRepo::new(&state.pool).get(id).await?;
    Ok(Json(StockRepo::new(&state.pool).batches(id).await?))
}

/// GET /pharmacy/alerts
async fn alerts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<AlertReport>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let snapshot = MedicineRepo::new(&state.pool).stock_snapshot().await?;
    let today = today();
    let alerts = collect_alerts(&snapshot, today, state.expiry_window_days);
    let critical = alerts
        .iter()
        .filter(|a| a.severity() == AlertSeverity::Critical)
        .count();

    Ok(Json(AlertReport {
        generated_on: today,
        expiry_window_days: state.expiry_window_days,
        critical,
        warning: alerts.len() - critical,
        alerts,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/medicines", get(list_medicines).post(create_medicine))
        .route("/medicines/{id}", get(get_medicine).patch(update_medicine))
        .route(
            "/medicines/{id}/transactions",
            get(transaction_history).post(record_transaction),
        )
        .route("/medicines/{id}/batches", get(list_batches))
        .route("/pharmacy/alerts", get(alerts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(kind: &str, quantity: i32, direction: Option<&str>) -> TransactionRequest {
        TransactionRequest {
            transaction_type: kind.into(),
            quantity,
            direction: direction.map(Into::into),
            batch_number: Some(" LOT-7 ".into()),
            expiry_date: None,
            reference: None,
        }
    }

    #[test]
    fn adjustment_needs_direction() {
        let err = transaction("adjustment", 5, None)
            .validate(Uuid::nil(), Uuid::nil())
            .unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "direction" });

        let ok = transaction("adjustment", 5, Some("decrease"))
            .validate(Uuid::nil(), Uuid::nil())
            .unwrap();
        assert_eq!(ok.movement.delta(), -5);
        assert_eq!(ok.batch_number.as_deref(), Some("LOT-7"));
    }

    #[test]
    fn unknown_type_and_zero_quantity_rejected() {
        assert!(matches!(
            transaction("gift", 1, None).validate(Uuid::nil(), Uuid::nil()),
            Err(ValidationError::InvalidVariant { .. })
        ));
        assert!(matches!(
            transaction("purchase", 0, None).validate(Uuid::nil(), Uuid::nil()),
            Err(ValidationError::OutOfRange { field: "quantity", .. })
        ));
    }

    #[test]
    fn medicine_defaults_and_negative_price() {
        let req = MedicineRequest {
            name: "Paracetamol 500mg".into(),
            generic_name: None,
            category: None,
            manufacturer: None,
            unit: None,
            unit_price_cents: 250,
            reorder_level: None,
            vendor_id: None,
        };
        let new = req.validate().unwrap();
        assert_eq!(new.unit, "unit");
        assert_eq!(new.reorder_level, 10);

        let bad = MedicineRequest {
            name: "X".into(),
            generic_name: None,
            category: None,
            manufacturer: None,
            unit: None,
            unit_price_cents: -1,
            reorder_level: None,
            vendor_id: None,
        };
        assert!(bad.validate().is_err());
    }
}
