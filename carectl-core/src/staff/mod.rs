//! Staff scheduling: shifts and leave requests.

pub mod leave;
pub mod shift;

pub use leave::{LeaveDecision, LeaveKind, LeaveRange, LeaveStatus};
pub use shift::{worked_minutes, ShiftStatus, ShiftWindow};
