//! Prescription dispensing progress

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

text_enum! {
    /// Aggregate dispensing state of a prescription.
    pub enum DispenseStatus: "dispense status" {
        Pending => "pending",
        PartiallyDispensed => "partially_dispensed",
        Dispensed => "dispensed",
    }
}

/// One medication line of a prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub dispensed_quantity: i32,
}

impl PrescriptionItem {
    pub fn outstanding(&self) -> i32 {
        (self.quantity - self.dispensed_quantity).max(0)
    }

    pub fn is_fully_dispensed(&self) -> bool {
        self.dispensed_quantity >= self.quantity
    }
}

/// Counts behind a prescription's dispensing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispenseSummary {
    pub total_items: usize,
    pub dispensed_items: usize,
    pub pending_items: usize,
    pub status: DispenseStatus,
}

impl DispenseSummary {
    pub fn of(items: &[PrescriptionItem]) -> Self {
        let total_items = items.len();
        let dispensed_items = items.iter().filter(|i| i.is_fully_dispensed()).count();
        let untouched = items.iter().filter(|i| i.dispensed_quantity == 0).count();

        let status = if total_items > 0 && dispensed_items == total_items {
            DispenseStatus::Dispensed
        } else if untouched == total_items {
            DispenseStatus::Pending
        } else {
            DispenseStatus::PartiallyDispensed
        };

        Self {
            total_items,
            dispensed_items,
            pending_items: total_items - dispensed_items,
            status,
        }
    }
}

impl DispenseStatus {
    pub fn aggregate(items: &[PrescriptionItem]) -> Self {
        DispenseSummary::of(items).status
    }
}

/// Units to hand out for `item`: everything outstanding, or at most
/// `requested` when the pharmacist gives a partial quantity.
pub fn plan_dispense(item: &PrescriptionItem, requested: Option<u32>) -> Result<i32, DomainError> {
    let outstanding = item.outstanding();
    if outstanding == 0 {
        return Err(DomainError::AlreadyDispensed);
    }
    Ok(match requested {
        Some(n) => (n.min(i32::MAX as u32) as i32).min(outstanding),
        None => outstanding,
    })
}
