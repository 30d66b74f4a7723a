//! Appointment booking
//!
//! Bookings lock the doctor's user row, so two requests for the same doctor
//! serialize and the overlap check sees every committed booking. The partial
//! unique index on (doctor, date, time) backs this up.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::appointments::{ensure_free, AppointmentStatus, Slot};
use carectl_core::{Paginated, Pagination, Role};

use super::total_of;
use crate::db::error::stored;
use crate::db::DbError;

const APPOINTMENT_SELECT: &str = r#"
    SELECT a.id, a.patient_id, p.name AS patient_name, a.doctor_id, d.name AS doctor_name,
           a.appointment_date, a.appointment_time, a.duration_minutes, a.reason, a.notes,
           a.status, a.created_at, a.updated_at
    FROM appointments a
    JOIN patients p ON p.id = a.patient_id
    JOIN users d ON d.id = a.doctor_id
"#;

/// Appointment with patient and doctor names joined in
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot: Slot,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

pub struct AppointmentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AppointmentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Book a slot. Fails with a conflict if the doctor already has an
    /// overlapping scheduled appointment.
    pub async fn book(&self, new: NewAppointment, created_by: Uuid) -> Result<Appointment, DbError> {
        let mut tx = self.pool.begin().await?;

        let doctor: Option<(String, bool)> =
            sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1 FOR UPDATE")
                .bind(new.doctor_id)
                .fetch_optional(&mut *tx)
                .await?;
        match doctor {
            None => return Err(DbError::not_found("doctor", new.doctor_id)),
            Some((role, active)) => {
                if stored(Role::parse(&role))? != Role::Doctor || !active {
                    return Err(DbError::InvalidReference(format!(
                        "user {} is not an active doctor",
                        new.doctor_id
                    )));
                }
            }
        }

        let booked: Vec<(NaiveDate, NaiveTime, i32)> = sqlx::query_as(
            r#"
            SELECT appointment_date, appointment_time, duration_minutes
            FROM appointments
            WHERE doctor_id = $1 AND appointment_date = $2 AND status = 'scheduled'
            "#,
        )
        .bind(new.doctor_id)
        .bind(new.slot.date)
        .fetch_all(&mut *tx)
        .await?;
        let booked: Vec<Slot> = booked
            .into_iter()
            .map(|(date, time, minutes)| Slot::stored(date, time, minutes))
            .collect();
        ensure_free(&new.slot, &booked)?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO appointments (patient_id, doctor_id, appointment_date, appointment_time,
                                      duration_minutes, reason, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .bind(new.slot.date)
        .bind(new.slot.time)
        .bind(new.slot.duration_minutes)
        .bind(new.reason.as_deref())
        .bind(new.notes.as_deref())
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::constraint(e, "the doctor is already booked at this time"))?;

        tx.commit().await?;
        tracing::info!(appointment_id = %id, doctor_id = %new.doctor_id, "appointment booked");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, DbError> {
        sqlx::query_as::<_, Appointment>(&format!("{APPOINTMENT_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("appointment", id))
    }

    pub async fn list(
        &self,
        filter: &AppointmentFilter,
        page: Pagination,
    ) -> Result<Paginated<Appointment>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT q.*, COUNT(*) OVER() AS total FROM ({APPOINTMENT_SELECT}
                WHERE ($1::uuid IS NULL OR a.doctor_id = $1)
                  AND ($2::uuid IS NULL OR a.patient_id = $2)
                  AND ($3::date IS NULL OR a.appointment_date = $3)
                  AND ($4::text IS NULL OR a.status = $4)
            ) q
            ORDER BY q.appointment_date, q.appointment_time
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(filter.doctor_id)
        .bind(filter.patient_id)
        .bind(filter.date)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Appointment::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    /// Move a scheduled appointment to a final status.
    pub async fn update_status(
        &self,
        id: Uuid,
        to: AppointmentStatus,
        notes: Option<&str>,
    ) -> Result<Appointment, DbError> {
        let mut tx = self.pool.begin().await?;

        let (current,): (String,) =
            sqlx::query_as("SELECT status FROM appointments WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("appointment", id))?;
        let next = stored(AppointmentStatus::parse(&current))?.transition(to)?;

        sqlx::query(
            r#"
            UPDATE appointments
            SET status = $2, notes = COALESCE($3, notes), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_patient, seed_user};
    use carectl_core::DomainError;
    use chrono::Duration;

    fn slot(days_ahead: i64, hour: u32, minute: u32) -> Slot {
        let date = (Utc::now() + Duration::days(days_ahead)).date_naive();
        Slot::stored(date, NaiveTime::from_hms_opt(hour, minute, 0).unwrap(), 30)
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn overlapping_booking_is_rejected() {
        let pool = pool().await;
        let doctor = seed_user(&pool, Role::Doctor).await;
        let clerk = seed_user(&pool, Role::Receptionist).await;
        let patient = seed_patient(&pool, clerk.id).await;
        let repo = AppointmentRepo::new(&pool);

        let booking = |slot| NewAppointment {
            patient_id: patient.id,
            doctor_id: doctor.id,
            slot,
            reason: Some("checkup".into()),
            notes: None,
        };

        repo.book(booking(slot(3, 9, 0)), clerk.id).await.unwrap();
        let err = repo.book(booking(slot(3, 9, 15)), clerk.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(DomainError::SlotConflict { .. })
        ));
        // Back-to-back is fine
        repo.book(booking(slot(3, 9, 30)), clerk.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn cancelled_slot_can_be_rebooked() {
        let pool = pool().await;
        let doctor = seed_user(&pool, Role::Doctor).await;
        let clerk = seed_user(&pool, Role::Receptionist).await;
        let patient = seed_patient(&pool, clerk.id).await;
        let repo = AppointmentRepo::new(&pool);

        let new = NewAppointment {
            patient_id: patient.id,
            doctor_id: doctor.id,
            slot: slot(4, 14, 0),
            reason: None,
            notes: None,
        };
        let first = repo.book(new.clone(), clerk.id).await.unwrap();
        repo.update_status(first.id, AppointmentStatus::Cancelled, Some("patient called"))
            .await
            .unwrap();
        repo.book(new, clerk.id).await.expect("slot is free again");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn only_doctors_take_appointments() {
        let pool = pool().await;
        let nurse = seed_user(&pool, Role::Nurse).await;
        let patient = seed_patient(&pool, nurse.id).await;
        let err = AppointmentRepo::new(&pool)
            .book(
                NewAppointment {
                    patient_id: patient.id,
                    doctor_id: nurse.id,
                    slot: slot(2, 10, 0),
                    reason: None,
                    notes: None,
                },
                nurse.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidReference(_)));
    }
}
