//! Stock transactions and batch quantities
//!
//! `medicines.current_stock` always equals the sum of its batch quantities:
//! every movement names the batch (or batches) it touches, and both sides
//! are written in one transaction with the medicine row locked.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use carectl_core::pharmacy::{
    allocate_fefo, allocate_from, Batch, BatchAllocation, Direction, StockMovement,
    TransactionType,
};
use carectl_core::{Paginated, Pagination, ValidationError};

use super::total_of;
use crate::db::error::stored;
use crate::db::DbError;

const TX_COLUMNS: &str = "id, medicine_id, batch_id, transaction_type, direction, quantity, \
     stock_after, reference, performed_by, created_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub transaction_type: String,
    pub direction: String,
    pub quantity: i32,
    pub stock_after: i32,
    pub reference: Option<String>,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    pub fn kind(&self) -> Result<TransactionType, DbError> {
        stored(TransactionType::parse(&self.transaction_type))
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BatchRow {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
    pub received_at: DateTime<Utc>,
}

impl From<&BatchRow> for Batch {
    fn from(row: &BatchRow) -> Self {
        Batch {
            id: row.id,
            batch_number: row.batch_number.clone(),
            expiry_date: row.expiry_date,
            quantity: row.quantity,
        }
    }
}

/// A requested movement against one medicine.
///
/// Purchases create (or top up) the batch named by `batch_number` and need
/// `expiry_date`. Returns and upward adjustments go back into a named,
/// existing batch. Sales and downward adjustments draw from the named batch
/// or, without one, first-expiry-first-out. Expired write-offs must name
/// the batch.
#[derive(Debug, Clone)]
pub struct NewStockTransaction {
    pub medicine_id: Uuid,
    pub movement: StockMovement,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub performed_by: Uuid,
}

pub struct StockRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Apply a movement and return the transaction rows it produced. A
    /// withdrawal spread over several batches yields one row per batch.
    pub async fn record_transaction(
        &self,
        new: NewStockTransaction,
        today: NaiveDate,
    ) -> Result<Vec<StockTransaction>, DbError> {
        let mut tx = self.pool.begin().await?;
        let rows = apply_movement(&mut *tx, &new, today).await?;
        tx.commit().await?;

        tracing::info!(
            medicine_id = %new.medicine_id,
            kind = %new.movement.kind(),
            quantity = new.movement.quantity(),
            "stock transaction recorded"
        );
        Ok(rows)
    }

    pub async fn history(
        &self,
        medicine_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<StockTransaction>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TX_COLUMNS}, COUNT(*) OVER() AS total
            FROM stock_transactions
            WHERE medicine_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(medicine_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(StockTransaction::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    /// Batches with stock left, earliest expiry first.
    pub async fn batches(&self, medicine_id: Uuid) -> Result<Vec<BatchRow>, DbError> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, medicine_id, batch_number, expiry_date, quantity, received_at
            FROM medicine_batches
            WHERE medicine_id = $1 AND quantity > 0
            ORDER BY expiry_date, batch_number
            "#,
        )
        .bind(medicine_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// Core of a stock movement, run on a connection that is already inside a
/// transaction. Dispensing reuses this for its `sale` rows.
pub(crate) async fn apply_movement(
    conn: &mut PgConnection,
    new: &NewStockTransaction,
    today: NaiveDate,
) -> Result<Vec<StockTransaction>, DbError> {
    let current: i32 =
        sqlx::query_scalar("SELECT current_stock FROM medicines WHERE id = $1 FOR UPDATE")
            .bind(new.medicine_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("medicine", new.medicine_id))?;

    // Validates the total before any batch is touched
    new.movement.apply(current)?;

    let allocations = match new.movement.direction() {
        Direction::Increase => vec![receive(conn, new).await?],
        Direction::Decrease => withdraw(conn, new, today).await?,
    };

    let mut stock = current;
    let mut rows = Vec::with_capacity(allocations.len());
    for alloc in allocations {
        let part = StockMovement::new(
            new.movement.kind(),
            alloc.quantity,
            Some(new.movement.direction()),
        )?;
        stock = part.apply(stock)?;

        let row = sqlx::query_as::<_, StockTransaction>(&format!(
            r#"
            INSERT INTO stock_transactions (medicine_id, batch_id, transaction_type, direction,
                                            quantity, stock_after, reference, performed_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(new.medicine_id)
        .bind(alloc.batch_id)
        .bind(part.kind().as_str())
        .bind(part.direction().as_str())
        .bind(part.quantity())
        .bind(stock)
        .bind(new.reference.as_deref())
        .bind(new.performed_by)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| DbError::constraint(e, "duplicate stock transaction"))?;
        rows.push(row);
    }

    sqlx::query("UPDATE medicines SET current_stock = $2, updated_at = NOW() WHERE id = $1")
        .bind(new.medicine_id)
        .bind(stock)
        .execute(&mut *conn)
        .await
        .map_err(|e| DbError::constraint(e, "stock update conflicts"))?;

    Ok(rows)
}

fn required_batch_number(new: &NewStockTransaction) -> Result<&str, ValidationError> {
    new.batch_number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::Empty {
            field: "batch_number",
        })
}

async fn receive(
    conn: &mut PgConnection,
    new: &NewStockTransaction,
) -> Result<BatchAllocation, DbError> {
    let batch_number = required_batch_number(new)?;
    let quantity = new.movement.quantity();

    let batch_id: Uuid = if new.movement.kind() == TransactionType::Purchase {
        let expiry = new.expiry_date.ok_or(ValidationError::Empty {
            field: "expiry_date",
        })?;
        // Topping up an existing batch only works if the expiry matches
        sqlx::query_scalar(
            r#"
            INSERT INTO medicine_batches (medicine_id, batch_number, expiry_date, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (medicine_id, batch_number) DO UPDATE
                SET quantity = medicine_batches.quantity + EXCLUDED.quantity
                WHERE medicine_batches.expiry_date = EXCLUDED.expiry_date
            RETURNING id
            "#,
        )
        .bind(new.medicine_id)
        .bind(batch_number)
        .bind(expiry)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            DbError::Conflict(format!(
                "batch '{}' already exists with a different expiry date",
                batch_number
            ))
        })?
    } else {
        sqlx::query_scalar(
            r#"
            UPDATE medicine_batches SET quantity = quantity + $3
            WHERE medicine_id = $1 AND batch_number = $2
            RETURNING id
            "#,
        )
        .bind(new.medicine_id)
        .bind(batch_number)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("batch", batch_number))?
    };

    Ok(BatchAllocation {
        batch_id,
        batch_number: batch_number.to_owned(),
        quantity,
    })
}

async fn withdraw(
    conn: &mut PgConnection,
    new: &NewStockTransaction,
    today: NaiveDate,
) -> Result<Vec<BatchAllocation>, DbError> {
    let requested = new.movement.quantity();
    let kind = new.movement.kind();

    let batches: Vec<Batch> = sqlx::query_as::<_, BatchRow>(
        r#"
        SELECT id, medicine_id, batch_number, expiry_date, quantity, received_at
        FROM medicine_batches
        WHERE medicine_id = $1
        FOR UPDATE
        "#,
    )
    .bind(new.medicine_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(Batch::from)
    .collect();

    let plan = match new.batch_number.as_deref().map(str::trim) {
        Some(number) if !number.is_empty() => {
            let batch = batches
                .iter()
                .find(|b| b.batch_number == number)
                .ok_or_else(|| DbError::not_found("batch", number))?;
            // Write-offs and corrections may touch expired stock
            let allow_expired = kind != TransactionType::Sale;
            vec![allocate_from(batch, requested, today, allow_expired)?]
        }
        _ if kind == TransactionType::Expired => {
            return Err(ValidationError::Empty {
                field: "batch_number",
            }
            .into())
        }
        _ => allocate_fefo(&batches, requested, today)?,
    };

    for alloc in &plan {
        sqlx::query("UPDATE medicine_batches SET quantity = quantity - $2 WHERE id = $1")
            .bind(alloc.batch_id)
            .bind(alloc.quantity)
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::constraint(e, "batch update conflicts"))?;
    }
    Ok(plan)
}
