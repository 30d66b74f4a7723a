//! Stock movements and the non-negative stock rule

use crate::error::DomainError;
use crate::models::ValidationError;

text_enum! {
    /// Kind of stock movement recorded against a medicine.
    pub enum TransactionType: "transaction type" {
        Purchase => "purchase",
        Sale => "sale",
        Return => "return",
        Adjustment => "adjustment",
        Expired => "expired",
    }
}

text_enum! {
    /// Which way a manual adjustment moves stock.
    pub enum Direction: "direction" {
        Increase => "increase",
        Decrease => "decrease",
    }
}

/// A validated stock movement: positive quantity plus the direction it
/// moves stock in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    kind: TransactionType,
    quantity: i32,
    direction: Direction,
}

impl StockMovement {
    /// Adjustments need an explicit direction; every other kind implies one
    /// and rejects a contradicting direction.
    pub fn new(
        kind: TransactionType,
        quantity: i32,
        direction: Option<Direction>,
    ) -> Result<Self, ValidationError> {
        if quantity <= 0 {
            return Err(ValidationError::OutOfRange {
                field: "quantity",
                reason: "must be greater than zero".into(),
            });
        }

        let implied = match kind {
            TransactionType::Purchase | TransactionType::Return => Some(Direction::Increase),
            TransactionType::Sale | TransactionType::Expired => Some(Direction::Decrease),
            TransactionType::Adjustment => None,
        };

        let direction = match (implied, direction) {
            (Some(implied), None) => implied,
            (Some(implied), Some(given)) if implied == given => implied,
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidFormat {
                    field: "direction",
                    reason: "only adjustments may choose a direction",
                })
            }
            (None, Some(given)) => given,
            (None, None) => {
                return Err(ValidationError::Empty {
                    field: "direction",
                })
            }
        };

        Ok(Self {
            kind,
            quantity,
            direction,
        })
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Signed change this movement makes to stock on hand.
    pub fn delta(&self) -> i32 {
        match self.direction {
            Direction::Increase => self.quantity,
            Direction::Decrease => -self.quantity,
        }
    }

    /// Stock on hand after this movement. Stock never goes below zero.
    pub fn apply(&self, current: i32) -> Result<i32, DomainError> {
        let next = current
            .checked_add(self.delta())
            .ok_or(DomainError::StockOverflow)?;
        if next < 0 {
            return Err(DomainError::InsufficientStock {
                available: current as i64,
                requested: self.quantity as i64,
            });
        }
        Ok(next)
    }
}

text_enum! {
    /// Coarse stock state used by alerts and dashboards.
    pub enum StockLevel: "stock level" {
        OutOfStock => "out_of_stock",
        Low => "low",
        Adequate => "adequate",
    }
}

impl StockLevel {
    pub fn classify(current: i32, reorder_level: i32) -> Self {
        if current <= 0 {
            Self::OutOfStock
        } else if current <= reorder_level {
            Self::Low
        } else {
            Self::Adequate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(kind: TransactionType, qty: i32) -> StockMovement {
        StockMovement::new(kind, qty, None).unwrap()
    }

    #[test]
    fn sale_decreases_stock() {
        assert_eq!(movement(TransactionType::Sale, 4).apply(10), Ok(6));
    }

    #[test]
    fn sale_fails_when_stock_would_go_negative() {
        let err = movement(TransactionType::Sale, 11).apply(10).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 10,
                requested: 11
            }
        );
    }

    #[test]
    fn sale_can_drain_to_zero() {
        assert_eq!(movement(TransactionType::Sale, 10).apply(10), Ok(0));
    }

    #[test]
    fn purchase_and_return_increase_stock() {
        assert_eq!(movement(TransactionType::Purchase, 5).apply(0), Ok(5));
        assert_eq!(movement(TransactionType::Return, 2).apply(5), Ok(7));
    }

    #[test]
    fn expired_write_off_decreases_stock() {
        assert_eq!(movement(TransactionType::Expired, 3).delta(), -3);
    }

    #[test]
    fn adjustment_requires_direction() {
        assert!(matches!(
            StockMovement::new(TransactionType::Adjustment, 1, None),
            Err(ValidationError::Empty { field: "direction" })
        ));
        let down =
            StockMovement::new(TransactionType::Adjustment, 2, Some(Direction::Decrease)).unwrap();
        assert_eq!(down.apply(5), Ok(3));
        let up =
            StockMovement::new(TransactionType::Adjustment, 2, Some(Direction::Increase)).unwrap();
        assert_eq!(up.apply(5), Ok(7));
    }

    #[test]
    fn contradicting_direction_rejected() {
        assert!(StockMovement::new(TransactionType::Sale, 1, Some(Direction::Increase)).is_err());
        assert!(StockMovement::new(TransactionType::Sale, 1, Some(Direction::Decrease)).is_ok());
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(StockMovement::new(TransactionType::Purchase, 0, None).is_err());
        assert!(StockMovement::new(TransactionType::Purchase, -5, None).is_err());
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(
            movement(TransactionType::Purchase, 1).apply(i32::MAX),
            Err(DomainError::StockOverflow)
        );
    }

    #[test]
    fn stock_levels() {
        assert_eq!(StockLevel::classify(0, 10), StockLevel::OutOfStock);
        assert_eq!(StockLevel::classify(10, 10), StockLevel::Low);
        assert_eq!(StockLevel::classify(11, 10), StockLevel::Adequate);
    }
}
