//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use carectl_core::{Permission, Role, ValidationError};

use super::auth::{bearer_token, AuthError};
use super::error::ApiError;
use super::server::AppState;
use crate::db::UserRepo;

/// The caller behind a valid bearer token whose account is still active.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.role.allows(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.id, role = %self.role, ?permission, "permission denied");
            Err(ApiError::forbidden(format!(
                "role '{}' is not allowed to do this",
                self.role
            )))
        }
    }

    /// Own records, or anyone's with `permission`.
    pub fn require_self_or(&self, owner: Uuid, permission: Permission) -> Result<(), ApiError> {
        if self.id == owner {
            Ok(())
        } else {
            self.require(permission)
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|v| v.to_str().map_err(|_| AuthError::InvalidToken))
            .transpose()?;
        let claims = state.keys.verify(bearer_token(header)?)?;

        // Deactivation takes effect before the token expires
        match UserRepo::new(&state.pool).is_active(claims.sub).await? {
            Some(true) => Ok(Self {
                id: claims.sub,
                role: claims.role,
            }),
            Some(false) => Err(AuthError::Inactive.into()),
            None => Err(AuthError::InvalidToken.into()),
        }
    }
}

/// Extract and validate a UUID from path
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "id" }))?;

        let uuid = Uuid::parse_str(&id).map_err(|_| {
            ApiError::Validation(ValidationError::InvalidFormat {
                field: "id",
                reason: "invalid UUID format",
            })
        })?;

        Ok(Self(uuid))
    }
}

/// JSON body whose parse failures use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
