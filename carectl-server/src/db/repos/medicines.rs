//! Medicine catalogue
//!
//! `current_stock` is only ever changed through [`super::StockRepo`]; this
//! repository creates medicines with zero stock and edits catalogue fields.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::pharmacy::{Batch, MedicineStock, StockLevel};
use carectl_core::{Paginated, Pagination};

use super::total_of;
use crate::db::DbError;

const MEDICINE_COLUMNS: &str = "id, name, generic_name, category, manufacturer, unit, \
     unit_price_cents, current_stock, reorder_level, vendor_id, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub unit: String,
    pub unit_price_cents: i64,
    pub current_stock: i32,
    pub reorder_level: i32,
    pub vendor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::classify(self.current_stock, self.reorder_level)
    }
}

#[derive(Debug, Clone)]
pub struct NewMedicine {
    pub name: String,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub unit: String,
    pub unit_price_cents: i64,
    pub reorder_level: i32,
    pub vendor_id: Option<Uuid>,
}

/// Catalogue fields that may change after creation; `None` keeps the value.
#[derive(Debug, Clone, Default)]
pub struct MedicineUpdate {
    pub category: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub reorder_level: Option<i32>,
    pub vendor_id: Option<Uuid>,
}

pub struct MedicineRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> MedicineRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, m: NewMedicine) -> Result<Medicine, DbError> {
        sqlx::query_as::<_, Medicine>(&format!(
            r#"
            INSERT INTO medicines (name, generic_name, category, manufacturer, unit,
                                   unit_price_cents, reorder_level, vendor_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {MEDICINE_COLUMNS}
            "#
        ))
        .bind(&m.name)
        .bind(m.generic_name.as_deref())
        .bind(m.category.as_deref())
        .bind(m.manufacturer.as_deref())
        .bind(&m.unit)
        .bind(m.unit_price_cents)
        .bind(m.reorder_level)
        .bind(m.vendor_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::constraint(e, "a medicine with this name already exists"))
    }

    pub async fn get(&self, id: Uuid) -> Result<Medicine, DbError> {
        sqlx::query_as::<_, Medicine>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("medicine", id))
    }

    /// `low_stock_only` keeps medicines at or below their reorder level.
    pub async fn list(
        &self,
        search: Option<&str>,
        low_stock_only: bool,
        page: Pagination,
    ) -> Result<Paginated<Medicine>, DbError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let rows = sqlx::query(&format!(
            r#"
            SELECT {MEDICINE_COLUMNS}, COUNT(*) OVER() AS total
            FROM medicines
            WHERE ($1::text IS NULL OR lower(name) LIKE $1 OR lower(generic_name) LIKE $1)
              AND (NOT $2 OR current_stock <= reorder_level)
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(pattern)
        .bind(low_stock_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Medicine::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn update(&self, id: Uuid, u: MedicineUpdate) -> Result<Medicine, DbError> {
        sqlx::query_as::<_, Medicine>(&format!(
            r#"
            UPDATE medicines SET
                category = COALESCE($2, category),
                unit_price_cents = COALESCE($3, unit_price_cents),
                reorder_level = COALESCE($4, reorder_level),
                vendor_id = COALESCE($5, vendor_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MEDICINE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(u.category.as_deref())
        .bind(u.unit_price_cents)
        .bind(u.reorder_level)
        .bind(u.vendor_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::constraint(e, "medicine update conflicts"))?
        .ok_or_else(|| DbError::not_found("medicine", id))
    }

    /// Every medicine with its non-empty batches, for alerting.
    /// Two queries regardless of catalogue size.
    pub async fn stock_snapshot(&self) -> Result<Vec<MedicineStock>, DbError> {
        let medicines: Vec<(Uuid, String, i32, i32)> = sqlx::query_as(
            "SELECT id, name, current_stock, reorder_level FROM medicines ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        let batches: Vec<(Uuid, Uuid, String, NaiveDate, i32)> = sqlx::query_as(
            r#"
            SELECT medicine_id, id, batch_number, expiry_date, quantity
            FROM medicine_batches
            WHERE quantity > 0
            ORDER BY expiry_date
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        let mut by_medicine: HashMap<Uuid, Vec<Batch>> = HashMap::new();
        for (medicine_id, id, batch_number, expiry_date, quantity) in batches {
            by_medicine.entry(medicine_id).or_default().push(Batch {
                id,
                batch_number,
                expiry_date,
                quantity,
            });
        }

        Ok(medicines
            .into_iter()
            .map(|(id, name, current_stock, reorder_level)| MedicineStock {
                id,
                name,
                current_stock,
                reorder_level,
                batches: by_medicine.remove(&id).unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_medicine};

    #[tokio::test]
    #[ignore = "requires database"]
    async fn new_medicine_starts_empty_and_low() {
        let pool = pool().await;
        let med = seed_medicine(&pool).await;
        assert_eq!(med.current_stock, 0);
        assert_eq!(med.stock_level(), StockLevel::OutOfStock);

        let low = MedicineRepo::new(&pool)
            .list(Some(&med.name), true, Pagination::default())
            .await
            .unwrap();
        assert!(low.items.iter().any(|m| m.id == med.id));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn update_keeps_unset_fields() {
        let pool = pool().await;
        let med = seed_medicine(&pool).await;
        let updated = MedicineRepo::new(&pool)
            .update(
                med.id,
                MedicineUpdate {
                    reorder_level: Some(42),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.reorder_level, 42);
        assert_eq!(updated.unit_price_cents, med.unit_price_cents);
    }
}
