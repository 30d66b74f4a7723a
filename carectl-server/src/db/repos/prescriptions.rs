//! Prescriptions and dispensing
//!
//! Dispensing locks the prescription, its items and (through the stock
//! path) each medicine row, then writes one `sale` movement per batch drawn.
//! Medicines are locked in id order so concurrent dispenses cannot deadlock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use carectl_core::pharmacy::{
    plan_dispense, DispenseStatus, DispenseSummary, PrescriptionItem, StockMovement,
    TransactionType,
};
use carectl_core::{DomainError, Paginated, Pagination, ValidationError};

use super::stock::{apply_movement, NewStockTransaction};
use super::total_of;
use crate::db::DbError;

const PRESCRIPTION_SELECT: &str = r#"
    SELECT rx.id, rx.patient_id, p.name AS patient_name, rx.doctor_id, d.name AS doctor_name,
           rx.notes, rx.status, rx.dispensed_by, rx.dispensed_at, rx.created_at, rx.updated_at
    FROM prescriptions rx
    JOIN patients p ON p.id = rx.patient_id
    JOIN users d ON d.id = rx.doctor_id
"#;

const ITEM_SELECT: &str = r#"
    SELECT i.id, i.prescription_id, i.medicine_id, m.name AS medicine_name, i.dosage,
           i.frequency, i.duration_days, i.quantity, i.dispensed_quantity
    FROM prescription_items i
    JOIN medicines m ON m.id = i.medicine_id
"#;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub notes: Option<String>,
    pub status: String,
    pub dispensed_by: Option<Uuid>,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PrescriptionItemRow {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: Option<i32>,
    pub quantity: i32,
    pub dispensed_quantity: i32,
}

impl PrescriptionItemRow {
    fn as_item(&self) -> PrescriptionItem {
        PrescriptionItem {
            id: self.id,
            medicine_id: self.medicine_id,
            quantity: self.quantity,
            dispensed_quantity: self.dispensed_quantity,
        }
    }
}

/// Prescription with its medication list and dispensing progress
#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionDetail {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub items: Vec<PrescriptionItemRow>,
    pub summary: DispenseSummary,
}

#[derive(Debug, Clone)]
pub struct NewPrescriptionItem {
    pub medicine_id: Uuid,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: Option<i32>,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub notes: Option<String>,
    pub items: Vec<NewPrescriptionItem>,
}

/// Units to hand out for one item; `None` dispenses everything outstanding.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DispenseLine {
    pub item_id: Uuid,
    pub quantity: Option<u32>,
}

pub struct PrescriptionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PrescriptionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewPrescription) -> Result<PrescriptionDetail, DbError> {
        if new.items.is_empty() {
            return Err(ValidationError::Empty { field: "items" }.into());
        }

        let mut tx = self.pool.begin().await?;
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO prescriptions (patient_id, doctor_id, notes) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .bind(new.notes.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::constraint(e, "duplicate prescription"))?;

        for item in &new.items {
            sqlx::query(
                r#"
                INSERT INTO prescription_items (prescription_id, medicine_id, dosage, frequency,
                                                duration_days, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(item.medicine_id)
            .bind(&item.dosage)
            .bind(&item.frequency)
            .bind(item.duration_days)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::constraint(e, "duplicate prescription item"))?;
        }

        tx.commit().await?;
        tracing::info!(prescription_id = %id, items = new.items.len(), "prescription created");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<PrescriptionDetail, DbError> {
        let prescription =
            sqlx::query_as::<_, Prescription>(&format!("{PRESCRIPTION_SELECT} WHERE rx.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("prescription", id))?;

        let items = sqlx::query_as::<_, PrescriptionItemRow>(&format!(
            "{ITEM_SELECT} WHERE i.prescription_id = $1 ORDER BY m.name, i.id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let core_items: Vec<PrescriptionItem> = items.iter().map(|i| i.as_item()).collect();
        Ok(PrescriptionDetail {
            prescription,
            summary: DispenseSummary::of(&core_items),
            items,
        })
    }

    pub async fn list(
        &self,
        patient_id: Option<Uuid>,
        doctor_id: Option<Uuid>,
        status: Option<DispenseStatus>,
        page: Pagination,
    ) -> Result<Paginated<Prescription>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT q.*, COUNT(*) OVER() AS total FROM ({PRESCRIPTION_SELECT}
                WHERE ($1::uuid IS NULL OR rx.patient_id = $1)
                  AND ($2::uuid IS NULL OR rx.doctor_id = $2)
                  AND ($3::text IS NULL OR rx.status = $3)
            ) q
            ORDER BY q.created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(patient_id)
        .bind(doctor_id)
        .bind(status.map(|s| s.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(Prescription::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    /// Dispense the given lines, or every outstanding item when `lines` is
    /// empty. All-or-nothing: one short medicine fails the whole request.
    pub async fn dispense(
        &self,
        id: Uuid,
        lines: &[DispenseLine],
        dispensed_by: Uuid,
        today: NaiveDate,
    ) -> Result<PrescriptionDetail, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM prescriptions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("prescription", id))?;

        let items = sqlx::query_as::<_, PrescriptionItemRow>(&format!(
            "{ITEM_SELECT} WHERE i.prescription_id = $1 ORDER BY i.medicine_id, i.id FOR UPDATE OF i"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let mut plan = plan_lines(&items, lines)?;
        plan.sort_by_key(|(item, _)| (item.medicine_id, item.id));

        for (item, quantity) in &plan {
            dispense_item(&mut tx, id, item, *quantity, dispensed_by, today).await?;
        }

        let progress: Vec<PrescriptionItem> = items
            .iter()
            .map(|row| {
                let mut item = row.as_item();
                if let Some((_, q)) = plan.iter().find(|(p, _)| p.id == row.id) {
                    item.dispensed_quantity += q;
                }
                item
            })
            .collect();
        let status = DispenseStatus::aggregate(&progress);

        sqlx::query(
            r#"
            UPDATE prescriptions
            SET status = $2, dispensed_by = $3, dispensed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(dispensed_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(prescription_id = %id, status = %status, lines = plan.len(), "prescription dispensed");
        self.get(id).await
    }
}

/// Resolve requested lines to (item, units) pairs.
fn plan_lines<'r>(
    items: &'r [PrescriptionItemRow],
    lines: &[DispenseLine],
) -> Result<Vec<(&'r PrescriptionItemRow, i32)>, DbError> {
    if lines.is_empty() {
        let outstanding: Vec<_> = items
            .iter()
            .filter(|row| !row.as_item().is_fully_dispensed())
            .map(|row| (row, row.as_item().outstanding()))
            .collect();
        if outstanding.is_empty() {
            return Err(DomainError::AlreadyDispensed.into());
        }
        return Ok(outstanding);
    }

    let mut plan: Vec<(&PrescriptionItemRow, i32)> = Vec::with_capacity(lines.len());
    for line in lines {
        if plan.iter().any(|(row, _)| row.id == line.item_id) {
            return Err(ValidationError::InvalidFormat {
                field: "items",
                reason: "each item may appear only once",
            }
            .into());
        }
        let row = items
            .iter()
            .find(|row| row.id == line.item_id)
            .ok_or_else(|| DbError::not_found("prescription item", line.item_id))?;
        if line.quantity == Some(0) {
            return Err(ValidationError::OutOfRange {
                field: "quantity",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        plan.push((row, plan_dispense(&row.as_item(), line.quantity)?));
    }
    Ok(plan)
}

async fn dispense_item(
    tx: &mut Transaction<'_, Postgres>,
    prescription_id: Uuid,
    item: &PrescriptionItemRow,
    quantity: i32,
    dispensed_by: Uuid,
    today: NaiveDate,
) -> Result<(), DbError> {
    let movement = StockMovement::new(TransactionType::Sale, quantity, None)?;
    let sale = NewStockTransaction {
        medicine_id: item.medicine_id,
        movement,
        batch_number: None,
        expiry_date: None,
        reference: Some(format!("prescription:{}", prescription_id)),
        performed_by: dispensed_by,
    };
    apply_movement(&mut **tx, &sale, today).await?;

    sqlx::query(
        "UPDATE prescription_items SET dispensed_quantity = dispensed_quantity + $2 WHERE id = $1",
    )
    .bind(item.id)
    .bind(quantity)
    .execute(&mut **tx)
    .await
    .map_err(|e| DbError::constraint(e, "prescription item update conflicts"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::stock::StockRepo;
    use crate::db::repos::test_support::{pool, seed_medicine, seed_patient, seed_user};
    use carectl_core::Role;
    use chrono::Duration;

    fn row(quantity: i32, dispensed: i32) -> PrescriptionItemRow {
        PrescriptionItemRow {
            id: Uuid::new_v4(),
            prescription_id: Uuid::nil(),
            medicine_id: Uuid::new_v4(),
            medicine_name: "Amoxicillin".into(),
            dosage: "500mg".into(),
            frequency: "3x daily".into(),
            duration_days: Some(5),
            quantity,
            dispensed_quantity: dispensed,
        }
    }

    #[test]
    fn empty_lines_take_all_outstanding() {
        let items = vec![row(10, 10), row(6, 2)];
        let plan = plan_lines(&items, &[]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].1, 4);
    }

    #[test]
    fn nothing_outstanding_is_already_dispensed() {
        let items = vec![row(3, 3)];
        let err = plan_lines(&items, &[]).unwrap_err();
        assert!(matches!(err, DbError::Domain(DomainError::AlreadyDispensed)));
    }

    #[test]
    fn requested_quantity_is_capped_at_outstanding() {
        let items = vec![row(5, 1)];
        let lines = [DispenseLine {
            item_id: items[0].id,
            quantity: Some(10),
        }];
        assert_eq!(plan_lines(&items, &lines).unwrap()[0].1, 4);
    }

    #[test]
    fn duplicate_and_unknown_lines_are_rejected() {
        let items = vec![row(5, 0)];
        let dup = [
            DispenseLine { item_id: items[0].id, quantity: None },
            DispenseLine { item_id: items[0].id, quantity: Some(1) },
        ];
        assert!(matches!(plan_lines(&items, &dup), Err(DbError::Validation(_))));

        let unknown = [DispenseLine { item_id: Uuid::new_v4(), quantity: None }];
        assert!(matches!(plan_lines(&items, &unknown), Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn partial_then_full_dispense() {
        let pool = pool().await;
        let doctor = seed_user(&pool, Role::Doctor).await;
        let pharmacist = seed_user(&pool, Role::Pharmacy).await;
        let patient = seed_patient(&pool, doctor.id).await;
        let med = seed_medicine(&pool).await;
        let today = Utc::now().date_naive();

        StockRepo::new(&pool)
            .record_transaction(
                NewStockTransaction {
                    medicine_id: med.id,
                    movement: StockMovement::new(TransactionType::Purchase, 20, None).unwrap(),
                    batch_number: Some("RX-1".into()),
                    expiry_date: Some(today + Duration::days(180)),
                    reference: None,
                    performed_by: pharmacist.id,
                },
                today,
            )
            .await
            .unwrap();

        let repo = PrescriptionRepo::new(&pool);
        let rx = repo
            .create(NewPrescription {
                patient_id: patient.id,
                doctor_id: doctor.id,
                notes: None,
                items: vec![NewPrescriptionItem {
                    medicine_id: med.id,
                    dosage: "1 tablet".into(),
                    frequency: "daily".into(),
                    duration_days: Some(10),
                    quantity: 10,
                }],
            })
            .await
            .unwrap();
        assert_eq!(rx.summary.status, DispenseStatus::Pending);

        let item_id = rx.items[0].id;
        let partial = repo
            .dispense(rx.prescription.id, &[DispenseLine { item_id, quantity: Some(4) }], pharmacist.id, today)
            .await
            .unwrap();
        assert_eq!(partial.summary.status, DispenseStatus::PartiallyDispensed);

        let full = repo
            .dispense(rx.prescription.id, &[], pharmacist.id, today)
            .await
            .unwrap();
        assert_eq!(full.summary.status, DispenseStatus::Dispensed);
        assert_eq!(full.prescription.status, "dispensed");

        let err = repo
            .dispense(rx.prescription.id, &[], pharmacist.id, today)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(DomainError::AlreadyDispensed)));
    }
}
