//! Invoice arithmetic. Amounts are integer cents.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::models::{required_text, ValidationError};

/// 100% expressed in basis points.
const FULL_BASIS_POINTS: i64 = 10_000;

/// Largest accepted unit price: 100 million in the major currency unit.
pub const MAX_UNIT_PRICE_CENTS: i64 = 10_000_000_000;

text_enum! {
    pub enum PaymentStatus: "payment status" {
        Unpaid => "unpaid",
        PartiallyPaid => "partially_paid",
        Paid => "paid",
    }
}

text_enum! {
    pub enum PaymentMethod: "payment method" {
        Cash => "cash",
        Card => "card",
        Insurance => "insurance",
        BankTransfer => "bank_transfer",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl LineItem {
    pub fn new(description: &str, quantity: i32, unit_price_cents: i64) -> Result<Self, ValidationError> {
        let description = required_text(description, "description", 200)?;
        if quantity <= 0 {
            return Err(ValidationError::OutOfRange {
                field: "quantity",
                reason: "must be greater than zero".into(),
            });
        }
        if unit_price_cents < 0 {
            return Err(ValidationError::OutOfRange {
                field: "unit_price_cents",
                reason: "must not be negative".into(),
            });
        }
        if unit_price_cents > MAX_UNIT_PRICE_CENTS {
            return Err(ValidationError::OutOfRange {
                field: "unit_price_cents",
                reason: format!("must not exceed {}", MAX_UNIT_PRICE_CENTS),
            });
        }
        Ok(Self {
            description,
            quantity,
            unit_price_cents,
        })
    }

    pub fn amount_cents(&self) -> Result<i64, DomainError> {
        (self.quantity as i64)
            .checked_mul(self.unit_price_cents)
            .ok_or(DomainError::AmountOverflow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl InvoiceTotals {
    /// Tax applies after discount and is rounded half up to the cent.
    pub fn compute(
        items: &[LineItem],
        discount_cents: i64,
        tax_basis_points: i64,
    ) -> Result<Self, DomainError> {
        let subtotal_cents = items.iter().try_fold(0i64, |sum, item| {
            sum.checked_add(item.amount_cents()?)
                .ok_or(DomainError::AmountOverflow)
        })?;
        if discount_cents < 0 || discount_cents > subtotal_cents {
            return Err(DomainError::DiscountTooLarge {
                discount: discount_cents,
                subtotal: subtotal_cents,
            });
        }
        let taxable = subtotal_cents - discount_cents;
        let tax_cents = taxable
            .checked_mul(tax_basis_points)
            .and_then(|t| t.checked_add(FULL_BASIS_POINTS / 2))
            .map(|t| t / FULL_BASIS_POINTS)
            .ok_or(DomainError::AmountOverflow)?;
        let total_cents = taxable
            .checked_add(tax_cents)
            .ok_or(DomainError::AmountOverflow)?;
        Ok(Self {
            subtotal_cents,
            discount_cents,
            tax_cents,
            total_cents,
        })
    }
}

impl PaymentStatus {
    pub fn from_amounts(paid_cents: i64, total_cents: i64) -> Self {
        if paid_cents <= 0 && total_cents > 0 {
            Self::Unpaid
        } else if paid_cents < total_cents {
            Self::PartiallyPaid
        } else {
            Self::Paid
        }
    }
}

/// New paid amount and status after a payment of `amount_cents`.
pub fn apply_payment(
    paid_cents: i64,
    total_cents: i64,
    amount_cents: i64,
) -> Result<(i64, PaymentStatus), DomainError> {
    let outstanding = total_cents - paid_cents;
    if amount_cents > outstanding {
        return Err(DomainError::Overpayment {
            attempted: amount_cents,
            outstanding,
        });
    }
    let paid = paid_cents + amount_cents;
    Ok((paid, PaymentStatus::from_amounts(paid, total_cents)))
}

/// Validate tax rate: 0..=100% in basis points.
pub fn validate_tax_basis_points(bp: i64) -> Result<i64, ValidationError> {
    if !(0..=FULL_BASIS_POINTS).contains(&bp) {
        return Err(ValidationError::OutOfRange {
            field: "tax_basis_points",
            reason: "must be between 0 and 10000".into(),
        });
    }
    Ok(bp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("Consultation", 1, 5_000).unwrap(),
            LineItem::new("Bandage", 3, 250).unwrap(),
        ]
    }

    #[test]
    fn totals_with_discount_and_tax() {
        let totals = InvoiceTotals::compute(&items(), 750, 500).unwrap();
        assert_eq!(totals.subtotal_cents, 5_750);
        assert_eq!(totals.tax_cents, 250);
        assert_eq!(totals.total_cents, 5_250);
    }

    #[test]
    fn tax_rounds_half_up() {
        let one = vec![LineItem::new("Swab", 1, 10).unwrap()];
        // 10 * 5% = 0.5 cent
        assert_eq!(InvoiceTotals::compute(&one, 0, 500).unwrap().tax_cents, 1);
    }

    #[test]
    fn discount_cannot_exceed_subtotal() {
        assert!(matches!(
            InvoiceTotals::compute(&items(), 10_000, 0),
            Err(DomainError::DiscountTooLarge { .. })
        ));
    }

    #[test]
    fn line_item_validation() {
        assert!(LineItem::new("", 1, 1).is_err());
        assert!(LineItem::new("X-ray", 0, 1).is_err());
        assert!(LineItem::new("X-ray", 1, -1).is_err());
    }

    #[test]
    fn unit_price_is_capped() {
        assert!(LineItem::new("MRI", 1, MAX_UNIT_PRICE_CENTS).is_ok());
        assert!(matches!(
            LineItem::new("MRI", 2, i64::MAX / 2 + 1),
            Err(ValidationError::OutOfRange { field: "unit_price_cents", .. })
        ));
    }

    #[test]
    fn oversized_line_reports_overflow() {
        let item = LineItem {
            description: "MRI".into(),
            quantity: 2,
            unit_price_cents: i64::MAX / 2 + 1,
        };
        assert_eq!(item.amount_cents(), Err(DomainError::AmountOverflow));
        assert_eq!(
            InvoiceTotals::compute(&[item], 0, 0),
            Err(DomainError::AmountOverflow)
        );
    }

    #[test]
    fn subtotal_and_tax_overflow_are_errors() {
        let big = LineItem::new("Ward stay", 500_000_000, MAX_UNIT_PRICE_CENTS).unwrap();
        assert!(big.amount_cents().is_ok());
        assert_eq!(
            InvoiceTotals::compute(&[big.clone(), big], 0, 0),
            Err(DomainError::AmountOverflow)
        );

        let surgery = LineItem {
            description: "Surgery".into(),
            quantity: 1,
            unit_price_cents: 1_000_000_000_000_000_000,
        };
        assert_eq!(
            InvoiceTotals::compute(&[surgery], 0, FULL_BASIS_POINTS),
            Err(DomainError::AmountOverflow)
        );
    }

    #[test]
    fn payments_progress_status() {
        assert_eq!(PaymentStatus::from_amounts(0, 100), PaymentStatus::Unpaid);
        let (paid, status) = apply_payment(0, 100, 40).unwrap();
        assert_eq!((paid, status), (40, PaymentStatus::PartiallyPaid));
        let (paid, status) = apply_payment(paid, 100, 60).unwrap();
        assert_eq!((paid, status), (100, PaymentStatus::Paid));
        assert_eq!(
            apply_payment(paid, 100, 1),
            Err(DomainError::Overpayment {
                attempted: 1,
                outstanding: 0
            })
        );
    }

    #[test]
    fn free_invoice_is_paid() {
        assert_eq!(PaymentStatus::from_amounts(0, 0), PaymentStatus::Paid);
    }
}
