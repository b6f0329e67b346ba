pub mod cancel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod detection;
pub mod driver;
pub mod error;
pub mod grid;
pub mod ledger;
pub mod models;
pub mod process;
pub mod retry;
pub mod staging;
pub mod storage;
pub mod utils;

// Re-export commonly used items
pub use cancel::Cancellation;
pub use config::SweepConfig;
pub use driver::{SweepDriver, SweepOptions, SweepReport};
pub use error::SweepError;
pub use grid::{Grid, GridCell, ParamRange};
