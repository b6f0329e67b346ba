pub mod run_sweep;
pub mod show_grid;
pub mod sweep_status;

pub use run_sweep::{run_sweep, RunArgs};
pub use show_grid::show_grid;
pub use sweep_status::sweep_status;
