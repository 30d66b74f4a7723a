//! Batch-aware stock: which batches a withdrawal is taken from.
//!
//! Withdrawals consume the batch that expires first (FEFO). Expired batches
//! are never handed out; they leave stock through an `expired` write-off.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// One received lot of a medicine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
}

impl Batch {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }
}

/// Quantity taken from a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAllocation {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub quantity: i32,
}

/// Plan a withdrawal of `requested` units across `batches`, earliest expiry
/// first, ties broken by batch number.
pub fn allocate_fefo(
    batches: &[Batch],
    requested: i32,
    today: NaiveDate,
) -> Result<Vec<BatchAllocation>, DomainError> {
    let mut usable: Vec<&Batch> = batches
        .iter()
        .filter(|b| b.quantity > 0 && !b.is_expired(today))
        .collect();
    usable.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.batch_number.cmp(&b.batch_number))
    });

    let available: i64 = usable.iter().map(|b| b.quantity as i64).sum();
    if available < requested as i64 {
        return Err(DomainError::InsufficientStock {
            available,
            requested: requested as i64,
        });
    }

    let mut remaining = requested;
    let mut plan = Vec::new();
    for batch in usable {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        plan.push(BatchAllocation {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
        });
        remaining -= take;
    }

    Ok(plan)
}

/// Withdraw from one named batch. Expired batches may only be written off,
/// so `allow_expired` is set for `expired` transactions.
pub fn allocate_from(
    batch: &Batch,
    requested: i32,
    today: NaiveDate,
    allow_expired: bool,
) -> Result<BatchAllocation, DomainError> {
    if batch.is_expired(today) && !allow_expired {
        return Err(DomainError::BatchExpired {
            batch_number: batch.batch_number.clone(),
            expired_on: batch.expiry_date,
        });
    }
    if batch.quantity < requested {
        return Err(DomainError::InsufficientStock {
            available: batch.quantity as i64,
            requested: requested as i64,
        });
    }
    Ok(BatchAllocation {
        batch_id: batch.id,
        batch_number: batch.batch_number.clone(),
        quantity: requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(number: &str, expiry: NaiveDate, quantity: i32) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            batch_number: number.into(),
            expiry_date: expiry,
            quantity,
        }
    }

    #[test]
    fn earliest_expiry_goes_first() {
        let today = date(2026, 1, 1);
        let batches = vec![
            batch("B-LATE", date(2027, 6, 1), 10),
            batch("B-SOON", date(2026, 3, 1), 4),
        ];

        let plan = allocate_fefo(&batches, 6, today).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].batch_number, "B-SOON");
        assert_eq!(plan[0].quantity, 4);
        assert_eq!(plan[1].batch_number, "B-LATE");
        assert_eq!(plan[1].quantity, 2);
    }

    #[test]
    fn expired_and_empty_batches_are_skipped() {
        let today = date(2026, 1, 1);
        let batches = vec![
            batch("OLD", date(2025, 12, 31), 50),
            batch("EMPTY", date(2026, 2, 1), 0),
            batch("GOOD", date(2026, 5, 1), 5),
        ];

        let plan = allocate_fefo(&batches, 5, today).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].batch_number, "GOOD");
    }

    #[test]
    fn batch_expiring_today_is_still_usable() {
        let today = date(2026, 1, 1);
        let batches = vec![batch("TODAY", today, 3)];
        assert!(allocate_fefo(&batches, 3, today).is_ok());
    }

    #[test]
    fn shortfall_reports_usable_total() {
        let today = date(2026, 1, 1);
        let batches = vec![
            batch("OLD", date(2025, 1, 1), 100),
            batch("A", date(2026, 6, 1), 2),
        ];
        assert_eq!(
            allocate_fefo(&batches, 3, today),
            Err(DomainError::InsufficientStock {
                available: 2,
                requested: 3
            })
        );
    }

    #[test]
    fn named_batch_rules() {
        let today = date(2026, 1, 1);
        let expired = batch("X", date(2025, 1, 1), 5);
        assert!(matches!(
            allocate_from(&expired, 1, today, false),
            Err(DomainError::BatchExpired { .. })
        ));
        assert_eq!(allocate_from(&expired, 5, today, true).unwrap().quantity, 5);
        assert!(matches!(
            allocate_from(&expired, 6, today, true),
            Err(DomainError::InsufficientStock { .. })
        ));
    }
}
