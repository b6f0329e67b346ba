//! Sweep driver.
//!
//! Runs one pointing/chip through the whole rate/angle grid:
//!
//! 1. make sure no stack files from an earlier run are lying around
//! 2. create the per-pointing remote directory (retried)
//! 3. for every cell, in order: run the detection tool, upload its stack
//!    files (retried), delete them locally and check the directory is clean
//!
//! Any tool failure, cleanup failure, exhausted retry or operator interrupt
//! stops the sweep at that cell. Cells already uploaded stay uploaded.

use chrono::Utc;
use serde::Serialize;

use crate::cancel::Cancellation;
use crate::config::SweepConfig;
use crate::detection::DetectionTool;
use crate::error::{Result, SweepError};
use crate::grid::GridCell;
use crate::ledger::{Ledger, SweepKey};
use crate::models::{CellStatus, SweepTarget};
use crate::process::CommandRunner;
use crate::staging::StackOutputDir;
use crate::storage::RemoteStorage;

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Log every command without running anything.
    pub dry_run: bool,
    /// Skip cells the ledger already lists as uploaded.
    pub resume: bool,
    /// Delete leftover stack files instead of refusing to start.
    pub purge_stale: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub pointing: String,
    pub ccd: String,
    pub remote_dir: String,
    pub total_cells: usize,
    pub processed_cells: usize,
    pub skipped_cells: usize,
    pub empty_cells: usize,
    pub uploaded_files: usize,
    pub dry_run: bool,
    pub started_at: String,
    pub finished_at: String,
}

pub struct SweepDriver<'a, R> {
    config: &'a SweepConfig,
    target: &'a SweepTarget,
    runner: &'a R,
    ledger: Option<&'a Ledger<'a>>,
    options: SweepOptions,
    cancel: Cancellation,
}

impl<'a, R: CommandRunner> SweepDriver<'a, R> {
    pub fn new(config: &'a SweepConfig, target: &'a SweepTarget, runner: &'a R) -> Self {
        SweepDriver {
            config,
            target,
            runner,
            ledger: None,
            options: SweepOptions::default(),
            cancel: Cancellation::never(),
        }
    }

    pub fn with_ledger(mut self, ledger: &'a Ledger<'a>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self) -> Result<SweepReport> {
        self.config.validate()?;
        if self.options.resume && self.ledger.is_none() {
            return Err(SweepError::Config("--resume needs a ledger".to_string()));
        }

        let config = self.config;
        let target = self.target;
        let grid = config.grid();
        let staging = StackOutputDir::new(config, &target.pointing, &target.chip)?;
        let tool = DetectionTool::new(config)?;
        let storage =
            RemoteStorage::new(&config.storage, &config.retry, &self.cancel, self.runner);
        let remote_dir = target.remote_dir();
        let ccd = target.chip.padded();
        let key = SweepKey {
            pointing: target.pointing.as_str(),
            ccd: &ccd,
            stack_rerun: &config.stack_rerun,
        };

        let mut report = SweepReport {
            pointing: target.pointing.to_string(),
            ccd: ccd.clone(),
            remote_dir: remote_dir.clone(),
            total_cells: grid.len(),
            dry_run: self.options.dry_run,
            started_at: Utc::now().to_rfc3339(),
            ..SweepReport::default()
        };

        tracing::info!(
            "Sweeping pointing {} ccd {}: {} rate(s) x {} angle(s) = {} cell(s)",
            target.pointing,
            ccd,
            config.rates.count(),
            config.angles.count(),
            grid.len()
        );
        tracing::info!("Local stack output: {}", staging.path().display());

        self.check_stale(&staging)?;

        if self.options.dry_run {
            tracing::info!("[DRY RUN] {}", storage.mkdir_command(&remote_dir)?.display());
        } else {
            storage.ensure_dir(&remote_dir).await?;
        }

        for cell in grid.cells() {
            if self.options.resume && self.is_uploaded(&key, &cell)? {
                tracing::info!("Skipping {} (already uploaded)", cell);
                report.skipped_cells += 1;
                continue;
            }

            if self.options.dry_run {
                tracing::info!(
                    "[DRY RUN] {}",
                    tool.command(target, &cell).display()
                );
                report.processed_cells += 1;
                continue;
            }

            let run = tool.run(self.runner, target, &cell);
            if let Err(e) = self.cancel.guard(&format!("detection tool {}", cell), run).await {
                self.record_failure(&key, &cell);
                return Err(e);
            }

            let files = staging.stack_files()?;
            if files.is_empty() {
                tracing::warn!("{} produced no stack files, nothing to upload", cell);
                report.empty_cells += 1;
            } else {
                storage.upload(&files, &remote_dir).await?;
                staging.remove(&files)?;
            }
            staging.ensure_clean()?;

            if let Some(ledger) = self.ledger {
                ledger.record(&key, &cell, CellStatus::Uploaded, files.len())?;
            }

            report.processed_cells += 1;
            report.uploaded_files += files.len();
            tracing::info!(
                "[{}/{}] {} done, {} file(s) uploaded",
                cell.index + 1,
                grid.len(),
                cell,
                files.len()
            );
        }

        report.finished_at = Utc::now().to_rfc3339();
        tracing::info!(
            "Sweep complete: {} processed, {} skipped, {} file(s) uploaded to {}",
            report.processed_cells,
            report.skipped_cells,
            report.uploaded_files,
            remote_dir
        );
        Ok(report)
    }

    fn check_stale(&self, staging: &StackOutputDir) -> Result<()> {
        let stale = staging.stack_files()?;
        if stale.is_empty() {
            return Ok(());
        }
        if self.options.dry_run {
            tracing::warn!(
                "[DRY RUN] {} stale stack file(s) in {}",
                stale.len(),
                staging.path().display()
            );
            return Ok(());
        }
        if !self.options.purge_stale {
            tracing::error!(
                "{} stale stack file(s) in {}; remove them or pass --purge-stale",
                stale.len(),
                staging.path().display()
            );
            return Err(SweepError::StaleOutput {
                dir: staging.path().to_path_buf(),
                count: stale.len(),
            });
        }
        tracing::warn!("Purging {} stale stack file(s)", stale.len());
        staging.remove(&stale)
    }

    fn is_uploaded(&self, key: &SweepKey, cell: &GridCell) -> Result<bool> {
        match self.ledger {
            Some(ledger) => ledger.is_uploaded(key, cell),
            None => Ok(false),
        }
    }

    fn record_failure(&self, key: &SweepKey, cell: &GridCell) {
        if let Some(ledger) = self.ledger {
            if let Err(e) = ledger.record(key, cell, CellStatus::Failed, 0) {
                tracing::warn!("Could not record failure of {} in ledger: {}", cell, e);
            }
        }
    }
}
