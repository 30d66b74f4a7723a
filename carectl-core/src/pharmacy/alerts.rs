//! Low-stock and expiry alerting

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::batch::Batch;
use super::stock::StockLevel;

/// Expiry state of a batch relative to `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    Expired,
    ExpiringSoon { days_left: i64 },
    Ok,
}

impl ExpiryStatus {
    /// A batch expiring today is "expiring soon" with zero days left.
    pub fn classify(expiry: NaiveDate, today: NaiveDate, window_days: u32) -> Self {
        let days_left = (expiry - today).num_days();
        if days_left < 0 {
            Self::Expired
        } else if days_left <= window_days as i64 {
            Self::ExpiringSoon { days_left }
        } else {
            Self::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

/// Stock figures of one medicine, as fed to [`collect_alerts`].
#[derive(Debug, Clone)]
pub struct MedicineStock {
    pub id: Uuid,
    pub name: String,
    pub current_stock: i32,
    pub reorder_level: i32,
    pub batches: Vec<Batch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    OutOfStock {
        medicine_id: Uuid,
        medicine: String,
        reorder_level: i32,
    },
    LowStock {
        medicine_id: Uuid,
        medicine: String,
        current_stock: i32,
        reorder_level: i32,
    },
    Expired {
        medicine_id: Uuid,
        medicine: String,
        batch_number: String,
        expiry_date: NaiveDate,
        quantity: i32,
    },
    ExpiringSoon {
        medicine_id: Uuid,
        medicine: String,
        batch_number: String,
        expiry_date: NaiveDate,
        quantity: i32,
        days_left: i64,
    },
}

impl Alert {
    pub fn severity(&self) -> AlertSeverity {
        match self {
            Self::OutOfStock { .. } | Self::Expired { .. } => AlertSeverity::Critical,
            Self::LowStock { .. } | Self::ExpiringSoon { .. } => AlertSeverity::Warning,
        }
    }

    pub fn medicine(&self) -> &str {
        match self {
            Self::OutOfStock { medicine, .. }
            | Self::LowStock { medicine, .. }
            | Self::Expired { medicine, .. }
            | Self::ExpiringSoon { medicine, .. } => medicine,
        }
    }
}

/// Every alert for the given medicines, critical first, then by name.
/// Empty batches never alert.
pub fn collect_alerts(medicines: &[MedicineStock], today: NaiveDate, window_days: u32) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for med in medicines {
        match StockLevel::classify(med.current_stock, med.reorder_level) {
            StockLevel::OutOfStock => alerts.push(Alert::OutOfStock {
                medicine_id: med.id,
                medicine: med.name.clone(),
                reorder_level: med.reorder_level,
            }),
            StockLevel::Low => alerts.push(Alert::LowStock {
                medicine_id: med.id,
                medicine: med.name.clone(),
                current_stock: med.current_stock,
                reorder_level: med.reorder_level,
            }),
            StockLevel::Adequate => {}
        }

        for batch in med.batches.iter().filter(|b| b.quantity > 0) {
            match ExpiryStatus::classify(batch.expiry_date, today, window_days) {
                ExpiryStatus::Expired => alerts.push(Alert::Expired {
                    medicine_id: med.id,
                    medicine: med.name.clone(),
                    batch_number: batch.batch_number.clone(),
                    expiry_date: batch.expiry_date,
                    quantity: batch.quantity,
                }),
                ExpiryStatus::ExpiringSoon { days_left } => alerts.push(Alert::ExpiringSoon {
                    medicine_id: med.id,
                    medicine: med.name.clone(),
                    batch_number: batch.batch_number.clone(),
                    expiry_date: batch.expiry_date,
                    quantity: batch.quantity,
                    days_left,
                }),
                ExpiryStatus::Ok => {}
            }
        }
    }

    alerts.sort_by(|a, b| {
        a.severity()
            .cmp(&b.severity())
            .then_with(|| a.medicine().cmp(b.medicine()))
    });
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn medicine(name: &str, current: i32, reorder: i32, batches: Vec<Batch>) -> MedicineStock {
        MedicineStock {
            id: Uuid::new_v4(),
            name: name.into(),
            current_stock: current,
            reorder_level: reorder,
            batches,
        }
    }

    fn batch(number: &str, expiry: NaiveDate, quantity: i32) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            batch_number: number.into(),
            expiry_date: expiry,
            quantity,
        }
    }

    #[test]
    fn expiry_classification() {
        let today = date(2026, 3, 1);
        assert_eq!(
            ExpiryStatus::classify(date(2026, 2, 28), today, 30),
            ExpiryStatus::Expired
        );
        assert_eq!(
            ExpiryStatus::classify(today, today, 30),
            ExpiryStatus::ExpiringSoon { days_left: 0 }
        );
        assert_eq!(
            ExpiryStatus::classify(date(2026, 3, 31), today, 30),
            ExpiryStatus::ExpiringSoon { days_left: 30 }
        );
        assert_eq!(
            ExpiryStatus::classify(date(2026, 4, 1), today, 30),
            ExpiryStatus::Ok
        );
    }

    #[test]
    fn critical_alerts_sort_first() {
        let today = date(2026, 3, 1);
        let meds = vec![
            medicine("Amoxicillin", 5, 10, vec![]),
            medicine(
                "Ibuprofen",
                50,
                10,
                vec![
                    batch("IB-1", date(2026, 1, 1), 20),
                    batch("IB-2", date(2026, 3, 10), 30),
                ],
            ),
            medicine("Zinc", 0, 5, vec![]),
        ];

        let alerts = collect_alerts(&meds, today, 30);
        assert_eq!(alerts.len(), 4);
        assert!(matches!(alerts[0], Alert::Expired { .. }));
        assert_eq!(alerts[0].medicine(), "Ibuprofen");
        assert!(matches!(alerts[1], Alert::OutOfStock { .. }));
        assert_eq!(alerts[1].medicine(), "Zinc");
        assert!(matches!(alerts[2], Alert::LowStock { .. }));
        assert!(matches!(alerts[3], Alert::ExpiringSoon { days_left: 9, .. }));
    }

    #[test]
    fn empty_batches_and_healthy_stock_are_quiet() {
        let today = date(2026, 3, 1);
        let meds = vec![medicine(
            "Paracetamol",
            100,
            10,
            vec![batch("P-0", date(2025, 1, 1), 0)],
        )];
        assert!(collect_alerts(&meds, today, 30).is_empty());
    }

    #[test]
    fn alert_serializes_with_kind_tag() {
        let alert = Alert::OutOfStock {
            medicine_id: Uuid::nil(),
            medicine: "Zinc".into(),
            reorder_level: 5,
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "out_of_stock");
        assert_eq!(json["medicine"], "Zinc");
    }
}
