//! Role-specific dashboard counters

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use carectl_core::Role;

use crate::db::DbError;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub role: Role,
    pub metrics: BTreeMap<&'static str, i64>,
}

/// Parameters a counter query binds, in order.
#[derive(Debug, Clone, Copy)]
enum Args {
    None,
    User(Uuid),
    Date(NaiveDate),
    UserDate(Uuid, NaiveDate),
}

const TOTAL_PATIENTS: &str = "SELECT COUNT(*) FROM patients";
const APPOINTMENTS_ON: &str =
    "SELECT COUNT(*) FROM appointments WHERE appointment_date = $1 AND status = 'scheduled'";
const ACTIVE_ADMISSIONS: &str = "SELECT COUNT(*) FROM admissions WHERE status = 'admitted'";
const AVAILABLE_ROOMS: &str =
    "SELECT COUNT(*) FROM rooms WHERE status = 'available' AND occupied < capacity";
const UNPAID_INVOICES: &str = "SELECT COUNT(*) FROM invoices WHERE status <> 'paid'";
const LOW_STOCK: &str = "SELECT COUNT(*) FROM medicines WHERE current_stock <= reorder_level";
const OPEN_PRESCRIPTIONS: &str =
    "SELECT COUNT(*) FROM prescriptions WHERE status <> 'dispensed'";

pub struct DashboardRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Counters relevant to `role`, scoped to `user_id` where the role only
    /// sees its own work.
    pub async fn summary(
        &self,
        role: Role,
        user_id: Uuid,
        today: NaiveDate,
        expiry_window_days: u32,
    ) -> Result<DashboardSummary, DbError> {
        let queries: Vec<(&'static str, &'static str, Args)> = match role {
            Role::SuperAdmin | Role::Admin => vec![
                ("total_users", "SELECT COUNT(*) FROM users", Args::None),
                ("active_users", "SELECT COUNT(*) FROM users WHERE is_active", Args::None),
                ("total_patients", TOTAL_PATIENTS, Args::None),
                ("appointments_today", APPOINTMENTS_ON, Args::Date(today)),
                ("active_admissions", ACTIVE_ADMISSIONS, Args::None),
                ("available_rooms", AVAILABLE_ROOMS, Args::None),
                (
                    "pending_leave_requests",
                    "SELECT COUNT(*) FROM leave_requests WHERE status = 'pending'",
                    Args::None,
                ),
                ("unpaid_invoices", UNPAID_INVOICES, Args::None),
                ("low_stock_medicines", LOW_STOCK, Args::None),
            ],
            Role::Doctor => vec![
                (
                    "my_appointments_today",
                    "SELECT COUNT(*) FROM appointments
                     WHERE doctor_id = $1 AND appointment_date = $2 AND status = 'scheduled'",
                    Args::UserDate(user_id, today),
                ),
                (
                    "my_upcoming_appointments",
                    "SELECT COUNT(*) FROM appointments
                     WHERE doctor_id = $1 AND appointment_date >= $2 AND status = 'scheduled'",
                    Args::UserDate(user_id, today),
                ),
                (
                    "my_admitted_patients",
                    "SELECT COUNT(*) FROM admissions WHERE doctor_id = $1 AND status = 'admitted'",
                    Args::User(user_id),
                ),
                (
                    "my_open_prescriptions",
                    "SELECT COUNT(*) FROM prescriptions WHERE doctor_id = $1 AND status <> 'dispensed'",
                    Args::User(user_id),
                ),
            ],
            Role::Nurse => vec![
                ("active_admissions", ACTIVE_ADMISSIONS, Args::None),
                ("available_rooms", AVAILABLE_ROOMS, Args::None),
                (
                    "my_shifts_today",
                    "SELECT COUNT(*) FROM shifts
                     WHERE staff_id = $1 AND (starts_at AT TIME ZONE 'UTC')::date = $2
                       AND status <> 'cancelled'",
                    Args::UserDate(user_id, today),
                ),
                (
                    "my_pending_leave_requests",
                    "SELECT COUNT(*) FROM leave_requests WHERE staff_id = $1 AND status = 'pending'",
                    Args::User(user_id),
                ),
            ],
            Role::Receptionist => vec![
                ("total_patients", TOTAL_PATIENTS, Args::None),
                (
                    "patients_registered_today",
                    "SELECT COUNT(*) FROM patients WHERE (created_at AT TIME ZONE 'UTC')::date = $1",
                    Args::Date(today),
                ),
                ("appointments_today", APPOINTMENTS_ON, Args::Date(today)),
                ("unpaid_invoices", UNPAID_INVOICES, Args::None),
            ],
            Role::Pharmacy => vec![
                ("total_medicines", "SELECT COUNT(*) FROM medicines", Args::None),
                ("low_stock_medicines", LOW_STOCK, Args::None),
                (
                    "out_of_stock_medicines",
                    "SELECT COUNT(*) FROM medicines WHERE current_stock = 0",
                    Args::None,
                ),
                ("open_prescriptions", OPEN_PRESCRIPTIONS, Args::None),
                (
                    "expiring_batches",
                    "SELECT COUNT(*) FROM medicine_batches WHERE quantity > 0 AND expiry_date <= $1",
                    Args::Date(today + Duration::days(expiry_window_days as i64)),
                ),
            ],
        };

        let mut metrics = BTreeMap::new();
        for (name, sql, args) in queries {
            metrics.insert(name, self.count(sql, args).await?);
        }
        Ok(DashboardSummary { role, metrics })
    }

    async fn count(&self, sql: &str, args: Args) -> Result<i64, DbError> {
        let query = sqlx::query_scalar::<_, i64>(sql);
        let query = match args {
            Args::None => query,
            Args::User(user) => query.bind(user),
            Args::Date(date) => query.bind(date),
            Args::UserDate(user, date) => query.bind(user).bind(date),
        };
        Ok(query.fetch_one(self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_user};
    use chrono::Utc;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn every_role_gets_its_own_counters() {
        let pool = pool().await;
        let repo = DashboardRepo::new(&pool);
        let today = Utc::now().date_naive();

        for role in Role::ALL {
            let user = seed_user(&pool, *role).await;
            let summary = repo.summary(*role, user.id, today, 30).await.unwrap();
            assert_eq!(summary.role, *role);
            assert!(!summary.metrics.is_empty());
            assert!(summary.metrics.values().all(|v| *v >= 0));
        }

        let admin = seed_user(&pool, Role::Admin).await;
        let summary = repo.summary(Role::Admin, admin.id, today, 30).await.unwrap();
        assert!(summary.metrics["total_users"] >= 1);
    }
}
