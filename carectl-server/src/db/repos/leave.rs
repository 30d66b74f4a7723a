//! Leave requests

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::staff::{LeaveDecision, LeaveKind, LeaveRange, LeaveStatus};
use carectl_core::{DomainError, Paginated, Pagination};

use super::total_of;
use crate::db::error::stored;
use crate::db::DbError;

const LEAVE_SELECT: &str = r#"
    SELECT l.id, l.staff_id, u.name AS staff_name, l.leave_type, l.start_date, l.end_date,
           l.reason, l.status, l.reviewed_by, l.reviewed_at, l.review_note, l.created_at
    FROM leave_requests l
    JOIN users u ON u.id = l.staff_id
"#;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub staff_name: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub staff_id: Uuid,
    pub kind: LeaveKind,
    pub range: LeaveRange,
    pub reason: String,
}

pub struct LeaveRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> LeaveRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// File a request. Overlapping one's own pending or approved leave is
    /// a conflict.
    pub async fn request(&self, new: NewLeaveRequest) -> Result<LeaveRequest, DbError> {
        let mut tx = self.pool.begin().await?;

        // Serializes requests from the same staff member
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(new.staff_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("staff member", new.staff_id))?;

        let existing: Vec<(NaiveDate, NaiveDate, String)> = sqlx::query_as(
            "SELECT start_date, end_date, status FROM leave_requests WHERE staff_id = $1",
        )
        .bind(new.staff_id)
        .fetch_all(&mut *tx)
        .await?;
        for (start, end, status) in existing {
            if !stored(LeaveStatus::parse(&status))?.blocks_calendar() {
                continue;
            }
            let other = stored(LeaveRange::new(start, end))?;
            if other.overlaps(&new.range) {
                return Err(DomainError::SlotConflict {
                    what: "leave request",
                }
                .into());
            }
        }

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO leave_requests (staff_id, leave_type, start_date, end_date, reason)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(new.staff_id)
        .bind(new.kind.as_str())
        .bind(new.range.start)
        .bind(new.range.end)
        .bind(&new.reason)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::constraint(e, "duplicate leave request"))?;

        tx.commit().await?;
        tracing::info!(leave_id = %id, staff_id = %new.staff_id, days = new.range.days(), "leave requested");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<LeaveRequest, DbError> {
        sqlx::query_as::<_, LeaveRequest>(&format!("{LEAVE_SELECT} WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("leave request", id))
    }

    pub async fn decide(
        &self,
        id: Uuid,
        decision: LeaveDecision,
        reviewer: Uuid,
        note: Option<&str>,
    ) -> Result<LeaveRequest, DbError> {
        let mut tx = self.pool.begin().await?;

        let status: String =
            sqlx::query_scalar("SELECT status FROM leave_requests WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("leave request", id))?;
        let next = stored(LeaveStatus::parse(&status))?.decide(decision)?;

        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = $2, reviewed_by = $3, reviewed_at = NOW(), review_note = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(reviewer)
        .bind(note)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(leave_id = %id, status = %next, "leave decided");
        self.get(id).await
    }

    pub async fn list(
        &self,
        staff_id: Option<Uuid>,
        status: Option<LeaveStatus>,
        page: Pagination,
    ) -> Result<Paginated<LeaveRequest>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT q.*, COUNT(*) OVER() AS total FROM ({LEAVE_SELECT}
                WHERE ($1::uuid IS NULL OR l.staff_id = $1)
                  AND ($2::text IS NULL OR l.status = $2)
            ) q
            ORDER BY q.start_date DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(staff_id)
        .bind(status.map(|s| s.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(LeaveRequest::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }
}
