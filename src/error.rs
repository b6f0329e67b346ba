use std::path::PathBuf;
use thiserror::Error;

use crate::grid::GridCell;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("detection tool failed at cell {cell} (exit {}): {stderr_tail}", exit_label(.status_code))]
    ToolInvocation {
        cell: GridCell,
        status_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("failed to remove {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{count} stale stack file(s) left in {dir}")]
    StaleOutput { dir: PathBuf, count: usize },

    #[error("failed to list {dir}: {source}")]
    Staging {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} gave up after {attempts} attempt(s)")]
    RetryExhausted { operation: String, attempts: u32 },

    #[error("interrupted by operator during {operation}")]
    Interrupted { operation: String },

    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[source] std::io::Error),

    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
}

impl SweepError {
    /// Process exit code for a sweep that stopped on this error.
    ///
    /// A failing detection tool hands its own exit code through so batch
    /// schedulers see the same status the tool reported.
    pub fn exit_code(&self) -> u8 {
        match self {
            SweepError::ToolInvocation {
                status_code: Some(code),
                ..
            } => match u8::try_from(*code) {
                Ok(0) | Err(_) => 1,
                Ok(code) => code,
            },
            SweepError::Interrupted { .. } => 130,
            _ => 1,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

pub type Result<T> = std::result::Result<T, SweepError>;
