//! Staff shifts
//!
//! Status changes are single conditional `UPDATE`s guarded by the expected
//! current status; the partial unique index on in-progress shifts turns a
//! second concurrent check-in into a conflict.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::staff::{worked_minutes, ShiftStatus, ShiftWindow};
use carectl_core::{DomainError, Paginated, Pagination, Role};

use super::total_of;
use crate::db::error::stored;
use crate::db::DbError;

const SHIFT_SELECT: &str = r#"
    SELECT s.id, s.staff_id, u.name AS staff_name, s.starts_at, s.ends_at, s.department,
           s.status, s.checked_in_at, s.checked_out_at, s.created_by, s.created_at
    FROM shifts s
    JOIN users u ON u.id = s.staff_id
"#;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Shift {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub staff_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub department: Option<String>,
    pub status: String,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Shift {
    pub fn status(&self) -> Result<ShiftStatus, DbError> {
        stored(ShiftStatus::parse(&self.status))
    }

    /// Minutes between check-in and check-out, once both happened.
    pub fn worked_minutes(&self) -> Option<i64> {
        match (self.checked_in_at, self.checked_out_at) {
            (Some(start), Some(end)) => Some(worked_minutes(start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewShift {
    pub staff_id: Uuid,
    pub window: ShiftWindow,
    pub department: Option<String>,
}

pub struct ShiftRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ShiftRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Schedule a shift. Overlapping a staff member's other live shifts is
    /// a conflict.
    pub async fn schedule(&self, new: NewShift, created_by: Uuid) -> Result<Shift, DbError> {
        let mut tx = self.pool.begin().await?;

        let (role, active): (String, bool) =
            sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1 FOR UPDATE")
                .bind(new.staff_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("staff member", new.staff_id))?;
        if !stored(Role::parse(&role))?.is_staff() || !active {
            return Err(DbError::InvalidReference(format!(
                "user {} is not active staff",
                new.staff_id
            )));
        }

        let overlapping: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM shifts
            WHERE staff_id = $1 AND status <> 'cancelled'
              AND starts_at < $3 AND $2 < ends_at
            LIMIT 1
            "#,
        )
        .bind(new.staff_id)
        .bind(new.window.start)
        .bind(new.window.end)
        .fetch_optional(&mut *tx)
        .await?;
        if overlapping.is_some() {
            return Err(DomainError::SlotConflict { what: "shift" }.into());
        }

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO shifts (staff_id, starts_at, ends_at, department, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(new.staff_id)
        .bind(new.window.start)
        .bind(new.window.end)
        .bind(new.department.as_deref())
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::constraint(e, "shift overlaps another"))?;

        tx.commit().await?;
        tracing::info!(shift_id = %id, staff_id = %new.staff_id, "shift scheduled");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Shift, DbError> {
        sqlx::query_as::<_, Shift>(&format!("{SHIFT_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("shift", id))
    }

    pub async fn check_in(&self, id: Uuid, at: DateTime<Utc>) -> Result<Shift, DbError> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE shifts SET status = 'in_progress', checked_in_at = $2
            WHERE id = $1 AND status = 'scheduled'
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::constraint(e, "another shift is already in progress"))?;

        self.finish_transition(id, updated, ShiftStatus::check_in).await
    }

    pub async fn check_out(&self, id: Uuid, at: DateTime<Utc>) -> Result<Shift, DbError> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE shifts SET status = 'completed', checked_out_at = GREATEST($2, checked_in_at)
            WHERE id = $1 AND status = 'in_progress'
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(self.pool)
        .await?;

        self.finish_transition(id, updated, ShiftStatus::check_out).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Shift, DbError> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE shifts SET status = 'cancelled' WHERE id = $1 AND status = 'scheduled' RETURNING id",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        self.finish_transition(id, updated, ShiftStatus::cancel).await
    }

    /// Return the shift after a guarded update, or explain why the guard
    /// did not match.
    async fn finish_transition(
        &self,
        id: Uuid,
        updated: Option<Uuid>,
        step: fn(ShiftStatus) -> Result<ShiftStatus, DomainError>,
    ) -> Result<Shift, DbError> {
        let shift = self.get(id).await?;
        if updated.is_none() {
            step(shift.status()?)?;
            // Status changed between the update and the read
            return Err(DbError::Conflict("shift was modified concurrently".into()));
        }
        tracing::info!(shift_id = %id, status = %shift.status, "shift updated");
        Ok(shift)
    }

    pub async fn list(
        &self,
        staff_id: Option<Uuid>,
        date: Option<NaiveDate>,
        page: Pagination,
    ) -> Result<Paginated<Shift>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT q.*, COUNT(*) OVER() AS total FROM ({SHIFT_SELECT}
                WHERE ($1::uuid IS NULL OR s.staff_id = $1)
                  AND ($2::date IS NULL OR (s.starts_at AT TIME ZONE 'UTC')::date = $2)
            ) q
            ORDER BY q.starts_at
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(staff_id)
        .bind(date)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Shift::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_user};
    use chrono::Duration;

    fn window(from_now_hours: i64, length_hours: i64) -> ShiftWindow {
        let start = Utc::now() + Duration::hours(from_now_hours);
        ShiftWindow::new(start, start + Duration::hours(length_hours)).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn lifecycle_and_single_active_shift() {
        let pool = pool().await;
        let admin = seed_user(&pool, Role::Admin).await;
        let nurse = seed_user(&pool, Role::Nurse).await;
        let repo = ShiftRepo::new(&pool);

        let morning = repo
            .schedule(NewShift { staff_id: nurse.id, window: window(1, 8), department: None }, admin.id)
            .await
            .unwrap();
        let evening = repo
            .schedule(NewShift { staff_id: nurse.id, window: window(10, 8), department: None }, admin.id)
            .await
            .unwrap();

        repo.check_in(morning.id, Utc::now()).await.unwrap();
        let err = repo.check_in(evening.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let done = repo.check_out(morning.id, Utc::now()).await.unwrap();
        assert_eq!(done.status, "completed");
        assert!(done.worked_minutes().is_some());

        let err = repo.check_out(morning.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(DomainError::InvalidTransition { .. })));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn overlapping_shift_is_rejected() {
        let pool = pool().await;
        let admin = seed_user(&pool, Role::Admin).await;
        let doctor = seed_user(&pool, Role::Doctor).await;
        let repo = ShiftRepo::new(&pool);

        repo.schedule(NewShift { staff_id: doctor.id, window: window(2, 8), department: None }, admin.id)
            .await
            .unwrap();
        let err = repo
            .schedule(NewShift { staff_id: doctor.id, window: window(6, 4), department: None }, admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(DomainError::SlotConflict { .. })));
    }
}
