//! Rooms and inpatient admissions
//!
//! Admitting and discharging move the room's occupancy in the same
//! transaction as the admission row, with the room row locked.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::admissions::{AdmissionStatus, RoomKind, RoomOccupancy, RoomStatus};
use carectl_core::{Paginated, Pagination, Role};

use super::total_of;
use crate::db::error::stored;
use crate::db::DbError;

const ROOM_COLUMNS: &str =
    "id, room_number, room_type, capacity, occupied, status, daily_rate_cents, created_at";

const ADMISSION_SELECT: &str = r#"
    SELECT a.id, a.patient_id, p.name AS patient_name, a.room_id, r.room_number,
           a.doctor_id, d.name AS doctor_name, a.reason, a.status, a.admitted_at,
           a.discharged_at, a.discharge_notes, a.created_by
    FROM admissions a
    JOIN patients p ON p.id = a.patient_id
    JOIN rooms r ON r.id = a.room_id
    JOIN users d ON d.id = a.doctor_id
"#;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Room {
    pub id: Uuid,
    pub room_number: String,
    pub room_type: String,
    pub capacity: i32,
    pub occupied: i32,
    pub status: String,
    pub daily_rate_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Room {
    fn occupancy(&self) -> Result<RoomOccupancy, DbError> {
        Ok(RoomOccupancy {
            status: stored(RoomStatus::parse(&self.status))?,
            capacity: self.capacity,
            occupied: self.occupied,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub room_number: String,
    pub kind: RoomKind,
    pub capacity: i32,
    pub daily_rate_cents: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Admission {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub room_id: Uuid,
    pub room_number: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub reason: String,
    pub status: String,
    pub admitted_at: DateTime<Utc>,
    pub discharged_at: Option<DateTime<Utc>>,
    pub discharge_notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewAdmission {
    pub patient_id: Uuid,
    pub room_id: Uuid,
    pub doctor_id: Uuid,
    pub reason: String,
}

pub struct RoomRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> RoomRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, room: NewRoom) -> Result<Room, DbError> {
        let capacity = RoomOccupancy::validate_capacity(room.capacity)?;
        sqlx::query_as::<_, Room>(&format!(
            r#"
            INSERT INTO rooms (room_number, room_type, capacity, daily_rate_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING {ROOM_COLUMNS}
            "#
        ))
        .bind(&room.room_number)
        .bind(room.kind.as_str())
        .bind(capacity)
        .bind(room.daily_rate_cents)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::constraint(e, "a room with this number already exists"))
    }

    /// `available_only` keeps rooms that can take another patient.
    pub async fn list(&self, available_only: bool) -> Result<Vec<Room>, DbError> {
        let rooms = sqlx::query_as::<_, Room>(&format!(
            r#"
            SELECT {ROOM_COLUMNS} FROM rooms
            WHERE NOT $1 OR (status = 'available' AND occupied < capacity)
            ORDER BY room_number
            "#
        ))
        .bind(available_only)
        .fetch_all(self.pool)
        .await?;
        Ok(rooms)
    }

    /// Take a room out of service or put it back. A room with patients in
    /// it can go into maintenance but keeps its occupancy.
    pub async fn set_maintenance(&self, id: Uuid, maintenance: bool) -> Result<Room, DbError> {
        sqlx::query_as::<_, Room>(&format!(
            r#"
            UPDATE rooms SET status = CASE
                WHEN $2 THEN 'maintenance'
                WHEN occupied >= capacity THEN 'occupied'
                ELSE 'available'
            END
            WHERE id = $1
            RETURNING {ROOM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(maintenance)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("room", id))
    }
}

pub struct AdmissionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AdmissionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn admit(&self, new: NewAdmission, created_by: Uuid) -> Result<Admission, DbError> {
        let mut tx = self.pool.begin().await?;

        let doctor: Option<(String, bool)> =
            sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1")
                .bind(new.doctor_id)
                .fetch_optional(&mut *tx)
                .await?;
        let attending = match doctor {
            Some((role, active)) => active && stored(Role::parse(&role))? == Role::Doctor,
            None => false,
        };
        if !attending {
            return Err(DbError::InvalidReference(format!(
                "user {} is not an active doctor",
                new.doctor_id
            )));
        }

        let room = sqlx::query_as::<_, Room>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE"
        ))
        .bind(new.room_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("room", new.room_id))?;
        let next = room.occupancy()?.admit()?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO admissions (patient_id, room_id, doctor_id, reason, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(new.patient_id)
        .bind(new.room_id)
        .bind(new.doctor_id)
        .bind(&new.reason)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::constraint(e, "the patient is already admitted"))?;

        sqlx::query("UPDATE rooms SET occupied = $2, status = $3 WHERE id = $1")
            .bind(new.room_id)
            .bind(next.occupied)
            .bind(next.status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(admission_id = %id, room = %room.room_number, "patient admitted");
        self.get(id).await
    }

    pub async fn discharge(
        &self,
        id: Uuid,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Admission, DbError> {
        let mut tx = self.pool.begin().await?;

        let (status, admitted_at, room_id): (String, DateTime<Utc>, Uuid) = sqlx::query_as(
            "SELECT status, admitted_at, room_id FROM admissions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("admission", id))?;
        let next = stored(AdmissionStatus::parse(&status))?.discharge(admitted_at, at)?;

        let room = sqlx::query_as::<_, Room>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE"
        ))
        .bind(room_id)
        .fetch_one(&mut *tx)
        .await?;
        let freed = room.occupancy()?.release();

        sqlx::query(
            r#"
            UPDATE admissions SET status = $2, discharged_at = $3, discharge_notes = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(at)
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE rooms SET occupied = $2, status = $3 WHERE id = $1")
            .bind(room_id)
            .bind(freed.occupied)
            .bind(freed.status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(admission_id = %id, "patient discharged");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Admission, DbError> {
        sqlx::query_as::<_, Admission>(&format!("{ADMISSION_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("admission", id))
    }

    pub async fn list(
        &self,
        active_only: bool,
        patient_id: Option<Uuid>,
        page: Pagination,
    ) -> Result<Paginated<Admission>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT q.*, COUNT(*) OVER() AS total FROM ({ADMISSION_SELECT}
                WHERE (NOT $1 OR a.status = 'admitted')
                  AND ($2::uuid IS NULL OR a.patient_id = $2)
            ) q
            ORDER BY q.admitted_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(active_only)
        .bind(patient_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Admission::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_patient, seed_user};
    use carectl_core::{DomainError, Role};

    async fn seed_room(pool: &PgPool, capacity: i32) -> Room {
        RoomRepo::new(pool)
            .create(NewRoom {
                room_number: format!("R-{}", Uuid::new_v4().simple()),
                kind: RoomKind::General,
                capacity,
                daily_rate_cents: 15_000,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn single_bed_room_fills_and_frees() {
        let pool = pool().await;
        let doctor = seed_user(&pool, Role::Doctor).await;
        let first = seed_patient(&pool, doctor.id).await;
        let second = seed_patient(&pool, doctor.id).await;
        let room = seed_room(&pool, 1).await;
        let repo = AdmissionRepo::new(&pool);

        let admission = repo
            .admit(
                NewAdmission {
                    patient_id: first.id,
                    room_id: room.id,
                    doctor_id: doctor.id,
                    reason: "observation".into(),
                },
                doctor.id,
            )
            .await
            .unwrap();

        let err = repo
            .admit(
                NewAdmission {
                    patient_id: second.id,
                    room_id: room.id,
                    doctor_id: doctor.id,
                    reason: "surgery".into(),
                },
                doctor.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(DomainError::RoomUnavailable { .. })));

        let discharged = repo.discharge(admission.id, Some("stable"), Utc::now()).await.unwrap();
        assert_eq!(discharged.status, "discharged");

        let rooms = RoomRepo::new(&pool).list(true).await.unwrap();
        assert!(rooms.iter().any(|r| r.id == room.id && r.occupied == 0));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn patient_cannot_hold_two_admissions() {
        let pool = pool().await;
        let doctor = seed_user(&pool, Role::Doctor).await;
        let patient = seed_patient(&pool, doctor.id).await;
        let room = seed_room(&pool, 4).await;
        let repo = AdmissionRepo::new(&pool);
        let new = NewAdmission {
            patient_id: patient.id,
            room_id: room.id,
            doctor_id: doctor.id,
            reason: "fever".into(),
        };

        repo.admit(new.clone(), doctor.id).await.unwrap();
        let err = repo.admit(new, doctor.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn only_active_doctors_attend_admissions() {
        let pool = pool().await;
        let doctor = seed_user(&pool, Role::Doctor).await;
        let pharmacist = seed_user(&pool, Role::Pharmacy).await;
        let patient = seed_patient(&pool, doctor.id).await;
        let room = seed_room(&pool, 2).await;
        let repo = AdmissionRepo::new(&pool);

        let err = repo
            .admit(
                NewAdmission {
                    patient_id: patient.id,
                    room_id: room.id,
                    doctor_id: pharmacist.id,
                    reason: "observation".into(),
                },
                doctor.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidReference(_)));

        let err = repo
            .admit(
                NewAdmission {
                    patient_id: patient.id,
                    room_id: room.id,
                    doctor_id: Uuid::new_v4(),
                    reason: "observation".into(),
                },
                doctor.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidReference(_)));

        let rooms = RoomRepo::new(&pool).list(true).await.unwrap();
        assert!(rooms.iter().any(|r| r.id == room.id && r.occupied == 0));
    }
}
