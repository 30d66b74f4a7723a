//! Pharmacy alerts from the command line

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use carectl_core::pharmacy::{collect_alerts, Alert, AlertSeverity};
use carectl_core::CareConfig;
use carectl_server::db::MedicineRepo;

#[derive(Parser, Debug)]
pub struct AlertsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Expiry window in days (overrides pharmacy.expiry_window_days)
    #[arg(long)]
    pub window_days: Option<u32>,
}

pub async fn run_alerts(args: AlertsArgs) -> Result<()> {
    let config = CareConfig::load_for_database().context("Failed to load configuration")?;
    let window = args
        .window_days
        .unwrap_or(config.pharmacy.expiry_window_days);
    let pool = super::connect(&config).await?;

    let snapshot = MedicineRepo::new(&pool).stock_snapshot().await?;
    let alerts = collect_alerts(&snapshot, Utc::now().date_naive(), window);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&alerts)?);
        return Ok(());
    }

    if alerts.is_empty() {
        println!("No pharmacy alerts");
        return Ok(());
    }
    for alert in &alerts {
        println!("{}", describe(alert));
    }
    Ok(())
}

fn describe(alert: &Alert) -> String {
    let tag = match alert.severity() {
        AlertSeverity::Critical => "CRITICAL",
        AlertSeverity::Warning => "warning ",
    };
    let detail = match alert {
        Alert::OutOfStock { reorder_level, .. } => {
            format!("out of stock (reorder level {})", reorder_level)
        }
        Alert::LowStock {
            current_stock,
            reorder_level,
            ..
        } => format!("{} left, reorder level {}", current_stock, reorder_level),
        Alert::Expired {
            batch_number,
            expiry_date,
            quantity,
            ..
        } => format!("batch {} expired {} ({} units)", batch_number, expiry_date, quantity),
        Alert::ExpiringSoon {
            batch_number,
            quantity,
            days_left,
            ..
        } => format!("batch {} expires in {} days ({} units)", batch_number, days_left, quantity),
    };
    format!("{} {:<30} {}", tag, alert.medicine(), detail)
}
