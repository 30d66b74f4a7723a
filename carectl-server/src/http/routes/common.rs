//! Helpers shared by the route modules

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

use carectl_core::ValidationError;

use crate::db::AuditRepo;
use crate::http::extractors::AuthUser;
use crate::http::server::AppState;

/// Write an audit row for a completed mutation. A failed audit write is
/// logged; the mutation itself has already committed.
pub(super) async fn audit(
    state: &AppState,
    actor: &AuthUser,
    action: &str,
    entity: &str,
    entity_id: Option<Uuid>,
    details: Value,
) {
    if let Err(e) = AuditRepo::new(&state.pool)
        .record(Some(actor.id), action, entity, entity_id, details)
        .await
    {
        tracing::warn!(action, entity, "failed to write audit log: {}", e);
    }
}

pub(super) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse an optional `?status=` style filter into one of core's enums.
pub(super) fn parse_filter<T>(
    value: Option<&str>,
    parse: fn(&str) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use carectl_core::Role;

    #[test]
    fn blank_filter_is_none() {
        assert_eq!(parse_filter(Some("  "), Role::parse).unwrap(), None);
        assert_eq!(parse_filter(None, Role::parse).unwrap(), None);
        assert_eq!(parse_filter(Some("nurse"), Role::parse).unwrap(), Some(Role::Nurse));
        assert!(parse_filter(Some("janitor"), Role::parse).is_err());
    }
}
