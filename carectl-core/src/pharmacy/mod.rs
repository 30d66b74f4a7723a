//! Pharmacy rules: stock movements, batches, dispensing and alerts.

pub mod alerts;
pub mod batch;
pub mod dispensing;
pub mod stock;

pub use alerts::{collect_alerts, Alert, AlertSeverity, ExpiryStatus, MedicineStock};
pub use batch::{allocate_fefo, allocate_from, Batch, BatchAllocation};
pub use dispensing::{plan_dispense, DispenseStatus, DispenseSummary, PrescriptionItem};
pub use stock::{Direction, StockLevel, StockMovement, TransactionType};
