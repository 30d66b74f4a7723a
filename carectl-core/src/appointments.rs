//! Appointment slots and status transitions
//!
//! A slot always carries a time, so the doctor conflict check always runs.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::DomainError;
use crate::models::ValidationError;

pub const DEFAULT_DURATION_MINUTES: i32 = 30;
const MIN_DURATION_MINUTES: i32 = 5;
const MAX_DURATION_MINUTES: i32 = 240;

text_enum! {
    pub enum AppointmentStatus: "appointment status" {
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

impl AppointmentStatus {
    /// Every transition leaves `scheduled`; finished appointments are final.
    pub fn transition(self, to: AppointmentStatus) -> Result<Self, DomainError> {
        if self != Self::Scheduled || to == Self::Scheduled {
            return Err(DomainError::InvalidTransition {
                entity: "appointment",
                from: self.as_str(),
                to: to.as_str(),
            });
        }
        Ok(to)
    }

    /// Whether the appointment still occupies the doctor's calendar.
    pub fn holds_slot(self) -> bool {
        self == Self::Scheduled
    }
}

/// Bookable period on a doctor's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
}

impl Slot {
    /// Validate a new booking. Slots starting before `now` are rejected.
    pub fn new(
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: Option<i32>,
        now: NaiveDateTime,
    ) -> Result<Self, ValidationError> {
        let duration_minutes = duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(ValidationError::OutOfRange {
                field: "duration_minutes",
                reason: format!(
                    "must be between {} and {}",
                    MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
                ),
            });
        }
        let slot = Self {
            date,
            time,
            duration_minutes,
        };
        if slot.start() < now {
            return Err(ValidationError::OutOfRange {
                field: "appointment",
                reason: "cannot be booked in the past".into(),
            });
        }
        Ok(slot)
    }

    /// Rebuild a slot already stored in the database, skipping the past check.
    pub fn stored(date: NaiveDate, time: NaiveTime, duration_minutes: i32) -> Self {
        Self {
            date,
            time,
            duration_minutes,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.start() + Duration::minutes(self.duration_minutes as i64)
    }

    /// Half-open overlap: back-to-back slots do not conflict.
    pub fn conflicts(&self, other: &Slot) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

/// Fail with a conflict if `slot` overlaps any of `booked`.
pub fn ensure_free(slot: &Slot, booked: &[Slot]) -> Result<(), DomainError> {
    if booked.iter().any(|b| b.conflicts(slot)) {
        return Err(DomainError::SlotConflict {
            what: "appointment",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 11, 1).unwrap().and_time(time(12, 0))
    }

    #[test]
    fn default_duration() {
        let slot = Slot::new(date(), time(9, 0), None, now()).unwrap();
        assert_eq!(slot.duration_minutes, DEFAULT_DURATION_MINUTES);
        assert_eq!(slot.end().time(), time(9, 30));
    }

    #[test]
    fn rejects_past_and_bad_duration() {
        let yesterday = NaiveDate::from_ymd_opt(2026, 10, 31).unwrap();
        assert!(Slot::new(yesterday, time(9, 0), None, now()).is_err());
        assert!(Slot::new(date(), time(9, 0), Some(2), now()).is_err());
        assert!(Slot::new(date(), time(9, 0), Some(600), now()).is_err());
    }

    #[test]
    fn overlapping_slots_conflict() {
        let a = Slot::stored(date(), time(9, 0), 30);
        let b = Slot::stored(date(), time(9, 15), 30);
        let c = Slot::stored(date(), time(9, 30), 30);
        assert!(a.conflicts(&b));
        assert!(!a.conflicts(&c));
        assert!(ensure_free(&c, &[a]).is_ok());
        assert_eq!(
            ensure_free(&b, &[a, c]),
            Err(DomainError::SlotConflict {
                what: "appointment"
            })
        );
    }

    #[test]
    fn different_days_never_conflict() {
        let a = Slot::stored(date(), time(9, 0), 30);
        let b = Slot::stored(date().succ_opt().unwrap(), time(9, 0), 30);
        assert!(!a.conflicts(&b));
    }

    #[test]
    fn status_transitions() {
        assert_eq!(
            AppointmentStatus::Scheduled
                .transition(AppointmentStatus::Completed)
                .unwrap(),
            AppointmentStatus::Completed
        );
        assert!(AppointmentStatus::Cancelled
            .transition(AppointmentStatus::Completed)
            .is_err());
        assert!(AppointmentStatus::Scheduled
            .transition(AppointmentStatus::Scheduled)
            .is_err());
        assert!(!AppointmentStatus::NoShow.holds_slot());
    }
}
