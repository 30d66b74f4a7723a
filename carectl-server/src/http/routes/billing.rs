//! Invoices and payments

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use carectl_core::billing::{LineItem, PaymentMethod, PaymentStatus};
use carectl_core::models::optional_text;
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, ValidationError};

use super::common::{audit, parse_filter};
use crate::db::{BillingRepo, Invoice, InvoiceDetail, NewInvoice};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct LineItemRequest {
    pub description: String,
    #[serde(default = "one")]
    pub quantity: i32,
    pub unit_price_cents: i64,
}

fn one() -> i32 {
    1
}

#[derive(Deserialize)]
pub struct InvoiceRequest {
    pub patient_id: Uuid,
    pub admission_id: Option<Uuid>,
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub tax_basis_points: i64,
    pub due_date: Option<NaiveDate>,
}

impl InvoiceRequest {
    fn validate(self) -> Result<NewInvoice, ValidationError> {
        let items = self
            .items
            .iter()
            .map(|i| LineItem::new(&i.description, i.quantity, i.unit_price_cents))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NewInvoice {
            patient_id: self.patient_id,
            admission_id: self.admission_id,
            items,
            discount_cents: self.discount_cents,
            tax_basis_points: self.tax_basis_points,
            due_date: self.due_date,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct InvoiceQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: i64,
    pub method: String,
    pub reference: Option<String>,
}

/// POST /invoices
async fn create_invoice(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<InvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), ApiError> {
    user.require(Permission::ManageBilling)?;
    let detail = BillingRepo::new(&state.pool)
        .create(req.validate()?, user.id)
        .await?;
    audit(
        &state,
        &user,
        "create",
        "invoice",
        Some(detail.invoice.id),
        json!({ "patient_id": detail.invoice.patient_id, "total_cents": detail.invoice.total_cents }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /invoices?patient_id=&status=
async fn list_invoices(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<InvoiceQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Invoice>>, ApiError> {
    user.require(Permission::ManageBilling)?;
    let status = parse_filter(query.status.as_deref(), PaymentStatus::parse)?;
    let page = Pagination::from(params);
    Ok(Json(
        BillingRepo::new(&state.pool)
            .list(query.patient_id, status, page)
            .await?,
    ))
}

/// GET /invoices/{id}
async fn get_invoice(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<InvoiceDetail>, ApiError> {
    user.require(Permission::ManageBilling)?;
    Ok(Json(BillingRepo::new(&state.pool).get(id).await?))
}

/// POST /invoices/{id}/payments
async fn record_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), ApiError> {
    user.require(Permission::ManageBilling)?;
    let method = PaymentMethod::parse(req.method.trim())?;
    let reference = optional_text(req.reference.as_deref(), "reference", 100)?;

    let detail = BillingRepo::new(&state.pool)
        .record_payment(id, req.amount_cents, method, reference.as_deref(), user.id)
        .await?;
    audit(
        &state,
        &user,
        "payment",
        "invoice",
        Some(id),
        json!({ "amount_cents": req.amount_cents, "method": method, "status": detail.invoice.status }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/{id}", get(get_invoice))
        .route("/invoices/{id}/payments", post(record_payment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_defaults_to_one() {
        let req: InvoiceRequest = serde_json::from_value(json!({
            "patient_id": Uuid::nil(),
            "items": [{ "description": "Consultation", "unit_price_cents": 5000 }]
        }))
        .unwrap();
        let new = req.validate().unwrap();
        assert_eq!(new.items[0].quantity, 1);
        assert_eq!(new.discount_cents, 0);
        assert_eq!(new.tax_basis_points, 0);
    }

    #[test]
    fn blank_line_description_rejected() {
        let req: InvoiceRequest = serde_json::from_value(json!({
            "patient_id": Uuid::nil(),
            "items": [{ "description": " ", "unit_price_cents": 100 }]
        }))
        .unwrap();
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::Empty { field: "description" }
        );
    }
}
