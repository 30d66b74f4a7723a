//! Repository implementations for database access
//!
//! Each repository borrows the pool and follows these patterns:
//! - Lists return `Paginated` using `COUNT(*) OVER()` in the same query
//! - Unique violations become `DbError::Conflict` (no check-then-insert)
//! - Multi-step writes use one transaction and lock the rows they read

pub mod admissions;
pub mod appointments;
pub mod audit;
pub mod billing;
pub mod dashboard;
pub mod leave;
pub mod medicines;
pub mod patients;
pub mod prescriptions;
pub mod shifts;
pub mod stock;
pub mod users;
pub mod vendors;

pub use admissions::{Admission, AdmissionRepo, NewAdmission, NewRoom, Room, RoomRepo};
pub use appointments::{Appointment, AppointmentFilter, AppointmentRepo, NewAppointment};
pub use audit::{AuditEntry, AuditRepo};
pub use billing::{BillingRepo, Invoice, InvoiceDetail, InvoiceItem, NewInvoice, Payment};
pub use dashboard::{DashboardRepo, DashboardSummary};
pub use leave::{LeaveRepo, LeaveRequest, NewLeaveRequest};
pub use medicines::{Medicine, MedicineRepo, MedicineUpdate, NewMedicine};
pub use patients::{NewPatient, Patient, PatientRepo};
pub use prescriptions::{
    DispenseLine, NewPrescription, NewPrescriptionItem, Prescription, PrescriptionDetail,
    PrescriptionItemRow, PrescriptionRepo,
};
pub use shifts::{NewShift, Shift, ShiftRepo};
pub use stock::{BatchRow, NewStockTransaction, StockRepo, StockTransaction};
pub use users::{NewUser, User, UserCredentials, UserRepo};
pub use vendors::{NewVendor, Vendor, VendorRepo};

use sqlx::postgres::PgRow;
use sqlx::Row;

/// Read the `total` window column from the first row of a page.
pub(crate) fn total_of(rows: &[PgRow]) -> i64 {
    rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures for the database tests. Each seeded record gets a unique
    //! name so tests can share one database.

    use chrono::NaiveDate;
    use sqlx::PgPool;
    use uuid::Uuid;

    use carectl_core::models::{Email, PersonName};
    use carectl_core::Role;

    use super::{Medicine, MedicineRepo, NewMedicine, NewPatient, NewUser, Patient, PatientRepo, User, UserRepo};

    pub async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        crate::db::migrations::run(&pool).await.expect("migrations");
        pool
    }

    pub fn unique_email(prefix: &str) -> String {
        format!("{}-{}@example.test", prefix, Uuid::new_v4().simple())
    }

    pub async fn seed_user(pool: &PgPool, role: Role) -> User {
        UserRepo::new(pool)
            .create(NewUser {
                email: Email::new(&unique_email(role.as_str())).unwrap(),
                name: PersonName::new(&format!("Test {}", role)).unwrap(),
                role,
                password_hash: "not-a-real-hash".into(),
                phone: None,
                department: None,
            })
            .await
            .unwrap()
    }

    pub async fn seed_patient(pool: &PgPool, registered_by: Uuid) -> Patient {
        PatientRepo::new(pool)
            .create(
                NewPatient {
                    name: PersonName::new("Test Patient").unwrap(),
                    date_of_birth: NaiveDate::from_ymd_opt(1980, 4, 12).unwrap(),
                    gender: "other",
                    phone: None,
                    email: None,
                    address: None,
                    blood_group: None,
                    emergency_contact: None,
                    medical_history: None,
                },
                registered_by,
            )
            .await
            .unwrap()
    }

    pub async fn seed_medicine(pool: &PgPool) -> Medicine {
        MedicineRepo::new(pool)
            .create(NewMedicine {
                name: format!("Testmed {}", Uuid::new_v4().simple()),
                generic_name: None,
                category: Some("test".into()),
                manufacturer: None,
                unit: "tablet".into(),
                unit_price_cents: 125,
                reorder_level: 10,
                vendor_id: None,
            })
            .await
            .unwrap()
    }
}
