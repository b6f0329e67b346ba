use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;

use crate::cancel::Cancellation;
use crate::config::SweepConfig;
use crate::driver::{SweepDriver, SweepOptions, SweepReport};
use crate::ledger::Ledger;
use crate::models::SweepTarget;
use crate::process::TokioRunner;

pub struct RunArgs {
    pub target: SweepTarget,
    pub config: SweepConfig,
    pub options: SweepOptions,
    pub ledger: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

pub async fn run_sweep(args: RunArgs) -> Result<SweepReport> {
    let runner = TokioRunner;
    let cancel = Cancellation::on_shutdown_signal()?;

    let conn = match &args.ledger {
        Some(path) => Some(
            Connection::open(path)
                .with_context(|| format!("Failed to open ledger: {}", path.display()))?,
        ),
        None => None,
    };
    let ledger = conn.as_ref().map(Ledger::new).transpose()?;

    let mut driver = SweepDriver::new(&args.config, &args.target, &runner)
        .with_options(args.options)
        .with_cancellation(cancel);
    if let Some(ledger) = &ledger {
        driver = driver.with_ledger(ledger);
    }

    let report = driver.run().await?;

    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(report)
}
