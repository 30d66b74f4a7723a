//! API error type with IntoResponse
//!
//! Every failure leaves the server as `{"error": <code>, "message": <text>}`.
//! Database and internal details are logged, never returned.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use carectl_core::{DomainError, ValidationError};

use super::auth::AuthError;
use crate::db::DbError;

#[derive(Debug)]
pub enum ApiError {
    /// Input failed validation (400)
    Validation(ValidationError),

    /// Body could not be parsed (400)
    BadRequest { message: String },

    /// Missing or invalid credentials (401)
    Unauthenticated { reason: &'static str },

    /// Authenticated but not allowed (403)
    Forbidden { reason: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Clashes with existing state (409)
    Conflict { message: String },

    /// Well-formed but breaks a domain rule (422)
    Unprocessable { message: String },

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            Self::Validation(e) => ("validation_error", e.to_string()),
            Self::BadRequest { message } => ("bad_request", message),
            Self::Unauthenticated { reason } => ("unauthenticated", reason.to_owned()),
            Self::Forbidden { reason } => ("forbidden", reason),
            Self::NotFound { resource, id } => ("not_found", format!("{} '{}' not found", resource, id)),
            Self::Conflict { message } => ("conflict", message),
            Self::Unprocessable { message } => ("unprocessable", message),
            Self::Database(e) => {
                tracing::error!("Database error: {}", e);
                ("internal_error", "an internal error occurred".to_owned())
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                ("internal_error", "an internal error occurred".to_owned())
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        if e.is_conflict() {
            Self::Conflict {
                message: e.to_string(),
            }
        } else {
            Self::Unprocessable {
                message: e.to_string(),
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(message) => Self::Conflict { message },
            DbError::InvalidReference(message) => Self::Unprocessable { message },
            DbError::Check(constraint) => Self::Unprocessable {
                message: format!("constraint violated: {}", constraint),
            },
            DbError::Domain(e) => e.into(),
            DbError::Validation(e) => Self::Validation(e),
            DbError::Sqlx(_) | DbError::Corrupt(_) => Self::Database(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken => Self::Unauthenticated {
                reason: "missing bearer token",
            },
            AuthError::InvalidToken => Self::Unauthenticated {
                reason: "invalid or expired token",
            },
            AuthError::InvalidCredentials => Self::Unauthenticated {
                reason: "invalid email or password",
            },
            AuthError::Inactive => Self::Unauthenticated {
                reason: "account is deactivated",
            },
            AuthError::Hashing(message) | AuthError::Signing(message) => Self::Internal { message },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest {
            message: e.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let (status, body) = body_of(ValidationError::Empty { field: "name" }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "name cannot be empty");
    }

    #[tokio::test]
    async fn duplicate_is_409() {
        let err: ApiError = DbError::Conflict("a user with this email already exists".into()).into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[test]
    fn domain_errors_split_between_409_and_422() {
        let stock: ApiError = DbError::Domain(DomainError::InsufficientStock {
            available: 1,
            requested: 5,
        })
        .into();
        assert_eq!(stock.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let slot: ApiError = DomainError::SlotConflict { what: "appointment" }.into();
        assert_eq!(slot.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_amounts_and_dates_are_422() {
        let overflow: ApiError = DbError::Domain(DomainError::AmountOverflow).into();
        assert_eq!(overflow.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let admitted_at = chrono::Utc::now();
        let early: ApiError = DomainError::DischargeBeforeAdmission {
            admitted_at,
            discharged_at: admitted_at - chrono::Duration::minutes(30),
        }
        .into();
        assert_eq!(early.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn not_found_keeps_resource() {
        let err: ApiError = DbError::not_found("patient", "42").into();
        assert!(matches!(err, ApiError::NotFound { resource: "patient", .. }));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn database_details_are_hidden() {
        let err: ApiError = DbError::Corrupt("role 'janitor'".into()).into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "an internal error occurred");
    }

    #[test]
    fn auth_failures_are_401() {
        let err: ApiError = AuthError::InvalidToken.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
