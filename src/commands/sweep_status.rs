use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use crate::ledger::{Ledger, LedgerEntry};
use crate::models::{CellStatus, Chip};
use crate::utils::{format_timestamp, truncate_string};

pub fn sweep_status(
    ledger_path: &Path,
    pointing_filter: Option<String>,
    ccd_filter: Option<String>,
    format: &str,
) -> Result<()> {
    if !ledger_path.exists() {
        return Err(anyhow::anyhow!(
            "Ledger not found: {}",
            ledger_path.display()
        ));
    }
    let conn = Connection::open(ledger_path)
        .with_context(|| format!("Failed to open ledger: {}", ledger_path.display()))?;
    let ledger = Ledger::new(&conn)?;

    // The ledger stores padded ccd numbers.
    let ccd = ccd_filter.map(|c| Chip(c).padded());
    let entries = ledger.entries(pointing_filter.as_deref(), ccd.as_deref())?;

    match format {
        "json" => output_json(&entries)?,
        "csv" => output_csv(&entries),
        _ => output_table(&entries),
    }

    Ok(())
}

fn output_table(entries: &[LedgerEntry]) {
    println!(
        "{:<12} {:<5} {:<16} {:>8} {:>8} {:<10} {:>6} {:<16}",
        "Pointing", "CCD", "Rerun", "Rate", "Angle", "Status", "Files", "Finished"
    );
    println!("{:-<90}", "");

    for entry in entries {
        println!(
            "{:<12} {:<5} {:<16} {:>8} {:>8} {:<10} {:>6} {:<16}",
            truncate_string(&entry.pointing, 12),
            entry.ccd,
            truncate_string(&entry.stack_rerun, 16),
            entry.rate,
            entry.angle,
            CellStatus::from_i32(entry.status),
            entry.files,
            format_timestamp(entry.finished_at)
        );
    }

    let uploaded = entries
        .iter()
        .filter(|e| e.status == CellStatus::Uploaded as i32)
        .count();
    println!(
        "\nTotal: {} cells, {} uploaded, {} failed",
        entries.len(),
        uploaded,
        entries.len() - uploaded
    );
}

fn output_json(entries: &[LedgerEntry]) -> Result<()> {
    let json: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "pointing": entry.pointing,
                "ccd": entry.ccd,
                "stack_rerun": entry.stack_rerun,
                "rate": entry.rate,
                "angle": entry.angle,
                "status": CellStatus::from_i32(entry.status),
                "status_code": entry.status,
                "files": entry.files,
                "finished_at": entry.finished_at,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn output_csv(entries: &[LedgerEntry]) {
    println!("pointing,ccd,stack_rerun,rate,angle,status,files,finished_at");

    for entry in entries {
        println!(
            "{},{},{},{},{},{},{},{}",
            entry.pointing,
            entry.ccd,
            entry.stack_rerun,
            entry.rate,
            entry.angle,
            CellStatus::from_i32(entry.status),
            entry.files,
            entry.finished_at
        );
    }
}
