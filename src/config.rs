use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};
use crate::grid::{AngleOrder, Grid, ParamRange, MAX_GRID_CELLS};
use crate::retry::RetryPolicy;

pub const DEFAULT_TOOL: &str = "daomop-sns";
pub const DEFAULT_EXPTYPE: &str = "deepDiff";
pub const DEFAULT_FILTER: &str = "HSC-R2";

/// Log levels the detection tool accepts on `--log-level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ToolLogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

impl ToolLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolLogLevel::Error => "ERROR",
            ToolLogLevel::Info => "INFO",
            ToolLogLevel::Debug => "DEBUG",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "ERROR" => Some(ToolLogLevel::Error),
            "INFO" => Some(ToolLogLevel::Info),
            "DEBUG" => Some(ToolLogLevel::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub program: String,
    /// Appended after the generated flags, e.g. `["--stack-mode", "MEAN"]`.
    pub extra_args: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            program: DEFAULT_TOOL.to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Remote storage CLI invocations, each given as program plus leading args.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mkdir: Vec<String>,
    pub copy: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            mkdir: vec!["vmkdir".to_string(), "-p".to_string()],
            copy: vec!["vcp".to_string(), "-v".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub base_dir: PathBuf,
    pub diff_rerun: String,
    pub stack_rerun: String,
    pub exptype: String,
    pub filter: String,
    pub rates: ParamRange,
    pub angles: ParamRange,
    pub angle_order: AngleOrder,
    pub mask: bool,
    pub clip: u32,
    pub tool_log_level: ToolLogLevel,
    pub tool: ToolConfig,
    pub storage: StorageConfig,
    pub retry: RetryPolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            base_dir: PathBuf::from("HSC"),
            diff_rerun: "diff".to_string(),
            stack_rerun: "sns".to_string(),
            exptype: DEFAULT_EXPTYPE.to_string(),
            filter: DEFAULT_FILTER.to_string(),
            rates: ParamRange::new(0.5, 3.5, 0.5),
            angles: ParamRange::new(-10.0, 10.0, 2.5),
            angle_order: AngleOrder::Ascending,
            mask: true,
            clip: 16,
            tool_log_level: ToolLogLevel::Info,
            tool: ToolConfig::default(),
            storage: StorageConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SweepConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SweepError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SweepConfig = serde_json::from_str(&text)?;
        tracing::debug!("Loaded sweep configuration from {}", path.display());
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn grid(&self) -> Grid {
        Grid::new(&self.rates, &self.angles, self.angle_order)
    }

    /// The `--rerun` value handed to the tool.
    pub fn rerun_spec(&self) -> String {
        format!("{}:{}", self.diff_rerun, self.stack_rerun)
    }

    pub fn validate(&self) -> Result<()> {
        let rates = check_range("rates", &self.rates)?;
        let angles = check_range("angles", &self.angles)?;
        match rates.checked_mul(angles) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(SweepError::Config(format!(
                    "grid of {} rate(s) x {} angle(s) exceeds {} cells",
                    rates, angles, MAX_GRID_CELLS
                )))
            }
        }

        for (name, value) in [
            ("diff_rerun", &self.diff_rerun),
            ("stack_rerun", &self.stack_rerun),
            ("exptype", &self.exptype),
            ("filter", &self.filter),
        ] {
            if value.trim().is_empty() {
                return Err(SweepError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.diff_rerun.contains(':') || self.stack_rerun.contains(':') {
            return Err(SweepError::Config(
                "rerun names must not contain ':'".to_string(),
            ));
        }
        if self.base_dir.as_os_str().is_empty() {
            return Err(SweepError::Config("base_dir must not be empty".to_string()));
        }
        if self.tool.program.trim().is_empty() {
            return Err(SweepError::Config("tool.program must not be empty".to_string()));
        }
        if self.storage.mkdir.is_empty() || self.storage.copy.is_empty() {
            return Err(SweepError::Config(
                "storage.mkdir and storage.copy need at least a program name".to_string(),
            ));
        }
        self.retry.validate().map_err(SweepError::Config)?;
        Ok(())
    }
}

fn check_range(name: &str, range: &ParamRange) -> Result<usize> {
    if !range.is_well_formed() {
        return Err(SweepError::Config(format!(
            "{} range {}..{} step {} needs finite values, step > 0 and max >= min",
            name, range.min, range.max, range.step
        )));
    }
    range.checked_count().ok_or_else(|| {
        SweepError::Config(format!(
            "{} range {}..{} step {} has more than {} values",
            name, range.min, range.max, range.step, MAX_GRID_CELLS
        ))
    })
}
