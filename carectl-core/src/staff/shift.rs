//! Shift lifecycle: scheduled -> in_progress -> completed
//!
//! A scheduled shift may also be cancelled. Only one shift per staff member
//! can be in progress at a time; the database enforces that with a partial
//! unique index, this module only validates single-shift transitions.

use chrono::{DateTime, Duration, Utc};

use crate::error::DomainError;
use crate::models::ValidationError;

/// Longest shift that can be scheduled.
const MAX_SHIFT_HOURS: i64 = 24;

text_enum! {
    pub enum ShiftStatus: "shift status" {
        Scheduled => "scheduled",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl ShiftStatus {
    fn transition(self, to: ShiftStatus, allowed_from: ShiftStatus) -> Result<Self, DomainError> {
        if self == allowed_from {
            Ok(to)
        } else {
            Err(DomainError::InvalidTransition {
                entity: "shift",
                from: self.as_str(),
                to: to.as_str(),
            })
        }
    }

    pub fn check_in(self) -> Result<Self, DomainError> {
        self.transition(Self::InProgress, Self::Scheduled)
    }

    pub fn check_out(self) -> Result<Self, DomainError> {
        self.transition(Self::Completed, Self::InProgress)
    }

    pub fn cancel(self) -> Result<Self, DomainError> {
        self.transition(Self::Cancelled, Self::Scheduled)
    }

    pub fn is_active(self) -> bool {
        self == Self::InProgress
    }
}

/// Planned start and end of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ShiftWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::OutOfRange {
                field: "shift end",
                reason: "must be after the shift start".into(),
            });
        }
        if end - start > Duration::hours(MAX_SHIFT_HOURS) {
            return Err(ValidationError::OutOfRange {
                field: "shift",
                reason: format!("cannot be longer than {} hours", MAX_SHIFT_HOURS),
            });
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &ShiftWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Whole minutes between check-in and check-out, never negative.
pub fn worked_minutes(checked_in: DateTime<Utc>, checked_out: DateTime<Utc>) -> i64 {
    (checked_out - checked_in).num_minutes().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, h, 0, 0).unwrap()
    }

    #[test]
    fn happy_path() {
        let s = ShiftStatus::Scheduled.check_in().unwrap();
        assert_eq!(s, ShiftStatus::InProgress);
        assert!(s.is_active());
        assert_eq!(s.check_out().unwrap(), ShiftStatus::Completed);
    }

    #[test]
    fn cannot_check_in_twice() {
        let err = ShiftStatus::InProgress.check_in().unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                entity: "shift",
                from: "in_progress",
                to: "in_progress"
            }
        );
    }

    #[test]
    fn cannot_check_out_before_check_in() {
        assert!(ShiftStatus::Scheduled.check_out().is_err());
        assert!(ShiftStatus::Completed.check_out().is_err());
    }

    #[test]
    fn only_scheduled_shifts_cancel() {
        assert_eq!(
            ShiftStatus::Scheduled.cancel().unwrap(),
            ShiftStatus::Cancelled
        );
        assert!(ShiftStatus::InProgress.cancel().is_err());
        assert!(ShiftStatus::Cancelled.check_in().is_err());
    }

    #[test]
    fn window_validation() {
        assert!(ShiftWindow::new(at(8), at(16)).is_ok());
        assert!(ShiftWindow::new(at(16), at(8)).is_err());
        assert!(ShiftWindow::new(at(8), at(8)).is_err());
        assert!(ShiftWindow::new(at(0), at(0) + Duration::hours(25)).is_err());
    }

    #[test]
    fn window_overlap() {
        let day = ShiftWindow::new(at(8), at(16)).unwrap();
        let evening = ShiftWindow::new(at(16), at(23)).unwrap();
        let mid = ShiftWindow::new(at(12), at(20)).unwrap();
        assert!(!day.overlaps(&evening));
        assert!(day.overlaps(&mid));
    }

    #[test]
    fn minutes_worked() {
        assert_eq!(worked_minutes(at(8), at(16)), 480);
        assert_eq!(worked_minutes(at(16), at(8)), 0);
    }
}
