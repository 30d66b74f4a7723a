//! Leave requests: pending -> approved | rejected

use chrono::NaiveDate;

use crate::error::DomainError;
use crate::models::ValidationError;

/// Longest single leave request.
const MAX_LEAVE_DAYS: i64 = 90;

text_enum! {
    pub enum LeaveStatus: "leave status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum LeaveKind: "leave type" {
        Sick => "sick",
        Annual => "annual",
        Casual => "casual",
        Emergency => "emergency",
        Other => "other",
    }
}

text_enum! {
    /// Reviewer's verdict on a pending request.
    pub enum LeaveDecision: "decision" {
        Approve => "approve",
        Reject => "reject",
    }
}

impl LeaveStatus {
    pub fn decide(self, decision: LeaveDecision) -> Result<Self, DomainError> {
        let to = match decision {
            LeaveDecision::Approve => Self::Approved,
            LeaveDecision::Reject => Self::Rejected,
        };
        if self != Self::Pending {
            return Err(DomainError::InvalidTransition {
                entity: "leave request",
                from: self.as_str(),
                to: to.as_str(),
            });
        }
        Ok(to)
    }

    /// Requests that still block the calendar.
    pub fn blocks_calendar(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

/// Inclusive date range of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LeaveRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::OutOfRange {
                field: "end_date",
                reason: "must not be before start_date".into(),
            });
        }
        let range = Self { start, end };
        if range.days() > MAX_LEAVE_DAYS {
            return Err(ValidationError::OutOfRange {
                field: "leave",
                reason: format!("cannot exceed {} days", MAX_LEAVE_DAYS),
            });
        }
        Ok(range)
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &LeaveRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
    }

    #[test]
    fn pending_can_be_decided_once() {
        let approved = LeaveStatus::Pending.decide(LeaveDecision::Approve).unwrap();
        assert_eq!(approved, LeaveStatus::Approved);
        assert!(approved.decide(LeaveDecision::Reject).is_err());
        assert_eq!(
            LeaveStatus::Pending.decide(LeaveDecision::Reject).unwrap(),
            LeaveStatus::Rejected
        );
    }

    #[test]
    fn single_day_range() {
        let r = LeaveRange::new(d(3), d(3)).unwrap();
        assert_eq!(r.days(), 1);
    }

    #[test]
    fn reversed_range_rejected() {
        assert!(LeaveRange::new(d(5), d(3)).is_err());
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = LeaveRange::new(d(1), d(5)).unwrap();
        let b = LeaveRange::new(d(5), d(9)).unwrap();
        let c = LeaveRange::new(d(6), d(9)).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn rejected_requests_free_the_calendar() {
        assert!(LeaveStatus::Pending.blocks_calendar());
        assert!(!LeaveStatus::Rejected.blocks_calendar());
    }
}
