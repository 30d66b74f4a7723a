//! Patient registry

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::models::{Email, PersonName, Phone};
use carectl_core::{Paginated, Pagination};

use super::total_of;
use crate::db::DbError;

const PATIENT_COLUMNS: &str = "id, name, date_of_birth, gender, phone, email, address, \
     blood_group, emergency_contact, medical_history, registered_by, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub registered_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated patient fields, used for both registration and updates
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: PersonName,
    pub date_of_birth: NaiveDate,
    pub gender: &'static str,
    pub phone: Option<Phone>,
    pub email: Option<Email>,
    pub address: Option<String>,
    pub blood_group: Option<&'static str>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
}

pub struct PatientRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PatientRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, p: NewPatient, registered_by: Uuid) -> Result<Patient, DbError> {
        let patient = sqlx::query_as::<_, Patient>(&format!(
            r#"
            INSERT INTO patients (name, date_of_birth, gender, phone, email, address,
                                  blood_group, emergency_contact, medical_history, registered_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(p.name.as_str())
        .bind(p.date_of_birth)
        .bind(p.gender)
        .bind(p.phone.as_ref().map(Phone::as_str))
        .bind(p.email.as_ref().map(Email::as_str))
        .bind(p.address.as_deref())
        .bind(p.blood_group)
        .bind(p.emergency_contact.as_deref())
        .bind(p.medical_history.as_deref())
        .bind(registered_by)
        .fetch_one(self.pool)
        .await?;
        Ok(patient)
    }

    pub async fn get(&self, id: Uuid) -> Result<Patient, DbError> {
        sqlx::query_as::<_, Patient>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("patient", id))
    }

    /// Search matches name (case-insensitive substring) or phone prefix.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<Patient>, DbError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));
        let phone_prefix = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}%", escape_like(s)));

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PATIENT_COLUMNS}, COUNT(*) OVER() AS total
            FROM patients
            WHERE $1::text IS NULL OR lower(name) LIKE $1 OR phone LIKE $2
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(pattern)
        .bind(phone_prefix)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Patient::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn update(&self, id: Uuid, p: NewPatient) -> Result<Patient, DbError> {
        sqlx::query_as::<_, Patient>(&format!(
            r#"
            UPDATE patients SET
                name = $2, date_of_birth = $3, gender = $4, phone = $5, email = $6,
                address = $7, blood_group = $8, emergency_contact = $9,
                medical_history = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(p.name.as_str())
        .bind(p.date_of_birth)
        .bind(p.gender)
        .bind(p.phone.as_ref().map(Phone::as_str))
        .bind(p.email.as_ref().map(Email::as_str))
        .bind(p.address.as_deref())
        .bind(p.blood_group)
        .bind(p.emergency_contact.as_deref())
        .bind(p.medical_history.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("patient", id))
    }
}

/// Escape LIKE wildcards in user input.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_patient, seed_user};
    use carectl_core::Role;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn search_by_name_is_case_insensitive() {
        let pool = pool().await;
        let clerk = seed_user(&pool, Role::Receptionist).await;
        let patient = seed_patient(&pool, clerk.id).await;

        let needle = patient.name.to_uppercase();
        let page = PatientRepo::new(&pool)
            .list(Some(&needle), Pagination::new(1, 50))
            .await
            .unwrap();
        assert!(page.items.iter().any(|p| p.id == patient.id));
    }
}
