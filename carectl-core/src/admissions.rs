//! Admissions and room occupancy

use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::models::ValidationError;

text_enum! {
    pub enum AdmissionStatus: "admission status" {
        Admitted => "admitted",
        Discharged => "discharged",
    }
}

text_enum! {
    pub enum RoomStatus: "room status" {
        Available => "available",
        Occupied => "occupied",
        Maintenance => "maintenance",
    }
}

text_enum! {
    pub enum RoomKind: "room type" {
        General => "general",
        Private => "private",
        Icu => "icu",
        Maternity => "maternity",
        Isolation => "isolation",
    }
}

/// Bed usage of a room. `occupied` never exceeds `capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomOccupancy {
    pub status: RoomStatus,
    pub capacity: i32,
    pub occupied: i32,
}

impl RoomOccupancy {
    pub fn validate_capacity(capacity: i32) -> Result<i32, ValidationError> {
        if !(1..=50).contains(&capacity) {
            return Err(ValidationError::OutOfRange {
                field: "capacity",
                reason: "must be between 1 and 50".into(),
            });
        }
        Ok(capacity)
    }

    /// Occupancy after placing one more patient. The room turns `occupied`
    /// once its last bed is taken.
    pub fn admit(self) -> Result<Self, DomainError> {
        match self.status {
            RoomStatus::Maintenance => Err(DomainError::RoomUnavailable {
                reason: "under maintenance",
            }),
            RoomStatus::Occupied => Err(DomainError::RoomUnavailable { reason: "full" }),
            RoomStatus::Available if self.occupied >= self.capacity => {
                Err(DomainError::RoomUnavailable { reason: "full" })
            }
            RoomStatus::Available => {
                let occupied = self.occupied + 1;
                let status = if occupied >= self.capacity {
                    RoomStatus::Occupied
                } else {
                    RoomStatus::Available
                };
                Ok(Self {
                    status,
                    capacity: self.capacity,
                    occupied,
                })
            }
        }
    }

    /// Occupancy after one patient leaves. Rooms under maintenance stay so.
    pub fn release(self) -> Self {
        let occupied = (self.occupied - 1).max(0);
        let status = match self.status {
            RoomStatus::Maintenance => RoomStatus::Maintenance,
            _ => RoomStatus::Available,
        };
        Self {
            status,
            capacity: self.capacity,
            occupied,
        }
    }
}

impl AdmissionStatus {
    pub fn discharge(
        self,
        admitted_at: DateTime<Utc>,
        discharged_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if self != Self::Admitted {
            return Err(DomainError::InvalidTransition {
                entity: "admission",
                from: self.as_str(),
                to: Self::Discharged.as_str(),
            });
        }
        if discharged_at < admitted_at {
            return Err(DomainError::DischargeBeforeAdmission {
                admitted_at,
                discharged_at,
            });
        }
        Ok(Self::Discharged)
    }
}
