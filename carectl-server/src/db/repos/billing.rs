//! Invoices and payments

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::billing::{
    apply_payment, validate_tax_basis_points, InvoiceTotals, LineItem, PaymentMethod,
    PaymentStatus,
};
use carectl_core::{Paginated, Pagination, ValidationError};

use super::total_of;
use crate::db::DbError;

const INVOICE_SELECT: &str = r#"
    SELECT i.id, i.patient_id, p.name AS patient_name, i.admission_id, i.subtotal_cents,
           i.discount_cents, i.tax_cents, i.total_cents, i.paid_cents, i.status, i.due_date,
           i.created_by, i.created_at, i.updated_at
    FROM invoices i
    JOIN patients p ON p.id = i.patient_id
"#;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub admission_id: Option<Uuid>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn outstanding_cents(&self) -> i64 {
        self.total_cents - self.paid_cents
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub amount_cents: i64,
    pub method: String,
    pub reference: Option<String>,
    pub received_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub outstanding_cents: i64,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub patient_id: Uuid,
    pub admission_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub discount_cents: i64,
    pub tax_basis_points: i64,
    pub due_date: Option<NaiveDate>,
}

pub struct BillingRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BillingRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewInvoice, created_by: Uuid) -> Result<InvoiceDetail, DbError> {
        if new.items.is_empty() {
            return Err(ValidationError::Empty { field: "items" }.into());
        }
        let tax = validate_tax_basis_points(new.tax_basis_points)?;
        let totals = InvoiceTotals::compute(&new.items, new.discount_cents, tax)?;

        let mut tx = self.pool.begin().await?;
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO invoices (patient_id, admission_id, subtotal_cents, discount_cents,
                                  tax_cents, total_cents, status, due_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(new.patient_id)
        .bind(new.admission_id)
        .bind(totals.subtotal_cents)
        .bind(totals.discount_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(PaymentStatus::from_amounts(0, totals.total_cents).as_str())
        .bind(new.due_date)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::constraint(e, "duplicate invoice"))?;

        for item in &new.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (invoice_id, description, quantity, unit_price_cents, amount_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.amount_cents()?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(invoice_id = %id, total_cents = totals.total_cents, "invoice created");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<InvoiceDetail, DbError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{INVOICE_SELECT} WHERE i.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("invoice", id))?;

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, description, quantity, unit_price_cents, amount_cents
            FROM invoice_items WHERE invoice_id = $1 ORDER BY description, id
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, amount_cents, method, reference, received_by, created_at
            FROM payments WHERE invoice_id = $1 ORDER BY created_at
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(InvoiceDetail {
            outstanding_cents: invoice.outstanding_cents(),
            invoice,
            items,
            payments,
        })
    }

    /// Record a payment. Paying more than the outstanding balance fails.
    pub async fn record_payment(
        &self,
        invoice_id: Uuid,
        amount_cents: i64,
        method: PaymentMethod,
        reference: Option<&str>,
        received_by: Uuid,
    ) -> Result<InvoiceDetail, DbError> {
        if amount_cents <= 0 {
            return Err(ValidationError::OutOfRange {
                field: "amount_cents",
                reason: "must be greater than zero".into(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let (paid, total): (i64, i64) =
            sqlx::query_as("SELECT paid_cents, total_cents FROM invoices WHERE id = $1 FOR UPDATE")
                .bind(invoice_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("invoice", invoice_id))?;
        let (paid, status) = apply_payment(paid, total, amount_cents)?;

        sqlx::query(
            r#"
            INSERT INTO payments (invoice_id, amount_cents, method, reference, received_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(invoice_id)
        .bind(amount_cents)
        .bind(method.as_str())
        .bind(reference)
        .bind(received_by)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE invoices SET paid_cents = $2, status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(invoice_id)
        .bind(paid)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(invoice_id = %invoice_id, amount_cents, status = %status, "payment recorded");
        self.get(invoice_id).await
    }

    pub async fn list(
        &self,
        patient_id: Option<Uuid>,
        status: Option<PaymentStatus>,
        page: Pagination,
    ) -> Result<Paginated<Invoice>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT q.*, COUNT(*) OVER() AS total FROM ({INVOICE_SELECT}
                WHERE ($1::uuid IS NULL OR i.patient_id = $1)
                  AND ($2::text IS NULL OR i.status = $2)
            ) q
            ORDER BY q.created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(patient_id)
        .bind(status.map(|s| s.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Invoice::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_patient, seed_user};
    use carectl_core::{DomainError, Role};

    #[tokio::test]
    #[ignore = "requires database"]
    async fn payments_move_status_and_reject_overpayment() {
        let pool = pool().await;
        let clerk = seed_user(&pool, Role::Receptionist).await;
        let patient = seed_patient(&pool, clerk.id).await;
        let repo = BillingRepo::new(&pool);

        let invoice = repo
            .create(
                NewInvoice {
                    patient_id: patient.id,
                    admission_id: None,
                    items: vec![
                        LineItem::new("Consultation", 1, 5_000).unwrap(),
                        LineItem::new("Blood test", 2, 2_500).unwrap(),
                    ],
                    discount_cents: 0,
                    tax_basis_points: 1_000,
                    due_date: None,
                },
                clerk.id,
            )
            .await
            .unwrap();
        assert_eq!(invoice.invoice.total_cents, 11_000);
        assert_eq!(invoice.invoice.status, "unpaid");

        let id = invoice.invoice.id;
        let partial = repo
            .record_payment(id, 6_000, PaymentMethod::Cash, None, clerk.id)
            .await
            .unwrap();
        assert_eq!(partial.invoice.status, "partially_paid");
        assert_eq!(partial.outstanding_cents, 5_000);

        let err = repo
            .record_payment(id, 5_001, PaymentMethod::Card, None, clerk.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(DomainError::Overpayment { .. })));

        let paid = repo
            .record_payment(id, 5_000, PaymentMethod::Card, Some("POS-1"), clerk.id)
            .await
            .unwrap();
        assert_eq!(paid.invoice.status, "paid");
        assert_eq!(paid.payments.len(), 2);
    }
}
