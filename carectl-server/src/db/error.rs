//! Repository error type

use carectl_core::{DomainError, ValidationError};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("constraint violated: {0}")]
    Check(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("unreadable stored value: {0}")]
    Corrupt(String),
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Translate constraint violations into domain-level errors.
    /// `conflict` describes what a unique violation means for this write.
    pub fn constraint(err: sqlx::Error, conflict: &str) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return Self::Conflict(conflict.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                let what = db_err.constraint().unwrap_or("referenced record");
                return Self::InvalidReference(format!("{} does not exist", what));
            }
            if db_err.is_check_violation() {
                let what = db_err.constraint().unwrap_or("check constraint");
                return Self::Check(what.to_owned());
            }
        }
        Self::Sqlx(err)
    }
}

/// Parse a TEXT column holding one of core's enums.
pub(crate) fn stored<T>(parsed: Result<T, ValidationError>) -> Result<T, DbError> {
    parsed.map_err(|e| DbError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_pass_through() {
        let err = DbError::constraint(sqlx::Error::RowNotFound, "duplicate");
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn stored_value_errors_are_corrupt() {
        let err = stored(carectl_core::Role::parse("janitor")).unwrap_err();
        assert!(matches!(err, DbError::Corrupt(_)));
    }
}
