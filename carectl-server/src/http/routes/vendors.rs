//! Medicine suppliers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use carectl_core::models::{optional_text, required_text, Email, Phone};
use carectl_core::{Paginated, Pagination, PaginationParams, Permission, ValidationError};

use super::common::audit;
use crate::db::{NewVendor, Vendor, VendorRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, AuthUser, ValidUuid};
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct VendorRequest {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl VendorRequest {
    fn validate(self) -> Result<NewVendor, ValidationError> {
        Ok(NewVendor {
            name: required_text(&self.name, "name", 200)?,
            contact_person: optional_text(self.contact_person.as_deref(), "contact_person", 100)?,
            email: match self.email.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(e) => Some(Email::new(e)?),
            },
            phone: Phone::optional(self.phone.as_deref())?,
            address: optional_text(self.address.as_deref(), "address", 300)?,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct VendorQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// POST /vendors
async fn create_vendor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<VendorRequest>,
) -> Result<(StatusCode, Json<Vendor>), ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let vendor = VendorRepo::new(&state.pool).create(req.validate()?).await?;
    audit(&state, &user, "create", "vendor", Some(vendor.id), json!({ "name": vendor.name })).await;
    Ok((StatusCode::CREATED, Json(vendor)))
}

/// GET /vendors?include_inactive=
async fn list_vendors(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<VendorQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Vendor>>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let page = Pagination::from(params);
    Ok(Json(
        VendorRepo::new(&state.pool)
            .list(query.include_inactive, page)
            .await?,
    ))
}

/// GET /vendors/{id}
async fn get_vendor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Vendor>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    Ok(Json(VendorRepo::new(&state.pool).get(id).await?))
}

/// PUT /vendors/{id}
async fn update_vendor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<VendorRequest>,
) -> Result<Json<Vendor>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let vendor = VendorRepo::new(&state.pool).update(id, req.validate()?).await?;
    audit(&state, &user, "update", "vendor", Some(id), json!({})).await;
    Ok(Json(vendor))
}

/// DELETE /vendors/{id}: soft delete, medicines keep their supplier link
async fn deactivate_vendor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Vendor>, ApiError> {
    user.require(Permission::ManagePharmacy)?;
    let vendor = VendorRepo::new(&state.pool).deactivate(id).await?;
    audit(&state, &user, "deactivate", "vendor", Some(id), json!({})).await;
    Ok(Json(vendor))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vendors", get(list_vendors).post(create_vendor))
        .route(
            "/vendors/{id}",
            get(get_vendor).put(update_vendor).delete(deactivate_vendor),
        )
}
