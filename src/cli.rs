use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{SweepConfig, ToolLogLevel};
use crate::grid::{AngleOrder, ParamRange};

#[derive(Parser)]
#[command(name = "sns-sweep")]
#[command(
    about = "Drive daomop-sns over a rate/angle grid and stage the stacks to remote storage",
    long_about = None
)]
pub struct Cli {
    /// More driver logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sweep one pointing/ccd over the whole grid
    Run {
        /// Remote storage URI; a per-pointing directory is created beneath it
        storage_uri: String,

        /// Pointing (sky patch) identifier
        pointing: String,

        /// CCD / detector number
        ccd: String,

        #[command(flatten)]
        sweep: SweepOptionsArgs,

        /// Print the commands without running anything
        #[arg(long)]
        dry_run: bool,

        /// SQLite ledger recording finished cells
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Skip cells the ledger already lists as uploaded
        #[arg(long, requires = "ledger")]
        resume: bool,

        /// Delete leftover stack files from an earlier run before starting
        #[arg(long)]
        purge_stale: bool,

        /// Write a JSON summary of the sweep to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the rate/angle grid a sweep would cover
    Grid {
        #[command(flatten)]
        sweep: SweepOptionsArgs,

        /// Output format (json, csv, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// List cells recorded in a sweep ledger
    Status {
        /// SQLite ledger file
        ledger: PathBuf,

        /// Filter by pointing
        #[arg(short, long)]
        pointing: Option<String>,

        /// Filter by ccd (any form, e.g. 7 or 007)
        #[arg(short, long)]
        ccd: Option<String>,

        /// Output format (json, csv, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

/// Sweep configuration: a JSON file plus per-field overrides.
#[derive(Parser, Debug, Clone, Default)]
pub struct SweepOptionsArgs {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root directory of the pipeline data
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Rerun holding the difference images
    #[arg(long)]
    pub diff_rerun: Option<String>,

    /// Rerun the stacks are written to
    #[arg(long)]
    pub stack_rerun: Option<String>,

    /// Minimum shift rate ("/hr)
    #[arg(long, allow_hyphen_values = true)]
    pub rate_min: Option<f64>,

    /// Maximum shift rate ("/hr)
    #[arg(long, allow_hyphen_values = true)]
    pub rate_max: Option<f64>,

    /// Step-size for shift rate ("/hr)
    #[arg(long)]
    pub rate_step: Option<f64>,

    /// Minimum angle to shift at (deg)
    #[arg(long, allow_hyphen_values = true)]
    pub angle_min: Option<f64>,

    /// Maximum angle to shift at (deg)
    #[arg(long, allow_hyphen_values = true)]
    pub angle_max: Option<f64>,

    /// Step-size for shift angle (deg)
    #[arg(long)]
    pub angle_step: Option<f64>,

    /// Walk the angles from max down to min
    #[arg(long)]
    pub descending_angles: bool,

    /// Do not pass --mask to the tool
    #[arg(long)]
    pub no_mask: bool,

    /// Variance clip threshold passed to the tool
    #[arg(long)]
    pub clip: Option<u32>,

    /// Log level passed to the tool (ERROR, INFO, DEBUG)
    #[arg(long)]
    pub tool_log_level: Option<String>,

    /// Detection tool executable
    #[arg(long)]
    pub tool: Option<String>,

    /// Attempts for remote mkdir/upload; 0 retries until success
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// First delay between remote retries, in milliseconds
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,
}

impl SweepOptionsArgs {
    pub fn to_sweep_config(&self) -> anyhow::Result<SweepConfig> {
        let mut config = SweepConfig::load_or_default(self.config.as_deref())?;

        if let Some(base_dir) = &self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(rerun) = &self.diff_rerun {
            config.diff_rerun = rerun.clone();
        }
        if let Some(rerun) = &self.stack_rerun {
            config.stack_rerun = rerun.clone();
        }
        config.rates = override_range(config.rates, self.rate_min, self.rate_max, self.rate_step);
        config.angles =
            override_range(config.angles, self.angle_min, self.angle_max, self.angle_step);
        if self.descending_angles {
            config.angle_order = AngleOrder::Descending;
        }
        if self.no_mask {
            config.mask = false;
        }
        if let Some(clip) = self.clip {
            config.clip = clip;
        }
        if let Some(level) = &self.tool_log_level {
            config.tool_log_level = ToolLogLevel::parse(level).ok_or_else(|| {
                anyhow::anyhow!("Invalid tool log level: {}. Use ERROR, INFO or DEBUG", level)
            })?;
        }
        if let Some(tool) = &self.tool {
            config.tool.program = tool.clone();
        }
        match self.max_attempts {
            Some(0) => config.retry.max_attempts = None,
            Some(n) => config.retry.max_attempts = Some(n),
            None => {}
        }
        if let Some(delay) = self.retry_delay_ms {
            config.retry.initial_delay_ms = delay;
            config.retry.max_delay_ms = config.retry.max_delay_ms.max(delay);
        }

        config.validate()?;
        Ok(config)
    }
}

fn override_range(
    base: ParamRange,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
) -> ParamRange {
    ParamRange {
        min: min.unwrap_or(base.min),
        max: max.unwrap_or(base.max),
        step: step.unwrap_or(base.step),
    }
}
