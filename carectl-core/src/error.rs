//! Domain rule violations.
//!
//! Validation of raw input lives in [`crate::models::ValidationError`]; this
//! type covers rules that depend on current state (stock on hand, the status
//! a record is in, what else is booked).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("stock level would overflow")]
    StockOverflow,

    #[error("cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("requested slot overlaps an existing {what}")]
    SlotConflict { what: &'static str },

    #[error("batch {batch_number} expired on {expired_on}")]
    BatchExpired {
        batch_number: String,
        expired_on: chrono::NaiveDate,
    },

    #[error("prescription item is already fully dispensed")]
    AlreadyDispensed,

    #[error("room is not available: {reason}")]
    RoomUnavailable { reason: &'static str },

    #[error("payment of {attempted} exceeds outstanding balance of {outstanding}")]
    Overpayment { attempted: i64, outstanding: i64 },

    #[error("discount of {discount} exceeds subtotal of {subtotal}")]
    DiscountTooLarge { discount: i64, subtotal: i64 },

    #[error("invoice amount exceeds the supported range")]
    AmountOverflow,

    #[error("discharge at {discharged_at} precedes admission at {admitted_at}")]
    DischargeBeforeAdmission {
        admitted_at: chrono::DateTime<chrono::Utc>,
        discharged_at: chrono::DateTime<chrono::Utc>,
    },
}

impl DomainError {
    /// Conflicts with existing records (mapped to 409) as opposed to requests
    /// that can never succeed against the current state (422).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::SlotConflict { .. }
                | Self::AlreadyDispensed
                | Self::RoomUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        let err = DomainError::InsufficientStock {
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock: 3 available, 5 requested"
        );

        let err = DomainError::InvalidTransition {
            entity: "shift",
            from: "completed",
            to: "in_progress",
        };
        assert_eq!(
            err.to_string(),
            "cannot move shift from 'completed' to 'in_progress'"
        );
    }

    #[test]
    fn conflict_classification() {
        assert!(DomainError::SlotConflict { what: "appointment" }.is_conflict());
        assert!(!DomainError::StockOverflow.is_conflict());
        assert!(!DomainError::InsufficientStock {
            available: 0,
            requested: 1
        }
        .is_conflict());
        assert!(!DomainError::AmountOverflow.is_conflict());
    }
}
