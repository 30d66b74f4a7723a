//! Medicine suppliers

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::models::{Email, Phone};
use carectl_core::{Paginated, Pagination};

use super::total_of;
use crate::db::DbError;

const VENDOR_COLUMNS: &str =
    "id, name, contact_person, email, phone, address, is_active, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVendor {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub address: Option<String>,
}

pub struct VendorRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> VendorRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, v: NewVendor) -> Result<Vendor, DbError> {
        sqlx::query_as::<_, Vendor>(&format!(
            r#"
            INSERT INTO vendors (name, contact_person, email, phone, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VENDOR_COLUMNS}
            "#
        ))
        .bind(&v.name)
        .bind(v.contact_person.as_deref())
        .bind(v.email.as_ref().map(Email::as_str))
        .bind(v.phone.as_ref().map(Phone::as_str))
        .bind(v.address.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::constraint(e, "a vendor with this name already exists"))
    }

    pub async fn get(&self, id: Uuid) -> Result<Vendor, DbError> {
        sqlx::query_as::<_, Vendor>(&format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("vendor", id))
    }

    pub async fn list(&self, include_inactive: bool, page: Pagination) -> Result<Paginated<Vendor>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {VENDOR_COLUMNS}, COUNT(*) OVER() AS total
            FROM vendors
            WHERE $1 OR is_active
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(include_inactive)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Vendor::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn update(&self, id: Uuid, v: NewVendor) -> Result<Vendor, DbError> {
        sqlx::query_as::<_, Vendor>(&format!(
            r#"
            UPDATE vendors
            SET name = $2, contact_person = $3, email = $4, phone = $5, address = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VENDOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&v.name)
        .bind(v.contact_person.as_deref())
        .bind(v.email.as_ref().map(Email::as_str))
        .bind(v.phone.as_ref().map(Phone::as_str))
        .bind(v.address.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::constraint(e, "a vendor with this name already exists"))?
        .ok_or_else(|| DbError::not_found("vendor", id))
    }

    /// Soft delete: medicines keep their supplier reference.
    pub async fn deactivate(&self, id: Uuid) -> Result<Vendor, DbError> {
        sqlx::query_as::<_, Vendor>(&format!(
            r#"
            UPDATE vendors SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING {VENDOR_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("vendor", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::pool;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn deactivated_vendor_hidden_by_default() {
        let pool = pool().await;
        let repo = VendorRepo::new(&pool);
        let vendor = repo
            .create(NewVendor {
                name: format!("MedSupply {}", Uuid::new_v4()),
                contact_person: Some("R. Lopez".into()),
                email: None,
                phone: None,
                address: None,
            })
            .await
            .unwrap();
        repo.deactivate(vendor.id).await.unwrap();

        let active = repo.list(false, Pagination::new(1, 100)).await.unwrap();
        assert!(active.items.iter().all(|v| v.id != vendor.id));
        let all = repo.get(vendor.id).await.unwrap();
        assert!(!all.is_active);
    }
}
