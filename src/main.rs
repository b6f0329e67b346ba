use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use sns_sweep::cli::{Cli, Commands};
use sns_sweep::commands::{run_sweep, show_grid, sweep_status, RunArgs};
use sns_sweep::models::SweepTarget;
use sns_sweep::{SweepError, SweepOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            storage_uri,
            pointing,
            ccd,
            sweep,
            dry_run,
            ledger,
            resume,
            purge_stale,
            report,
        } => {
            let args = RunArgs {
                target: SweepTarget::new(&storage_uri, &pointing, &ccd),
                config: sweep.to_sweep_config()?,
                options: SweepOptions {
                    dry_run,
                    resume,
                    purge_stale,
                },
                ledger,
                report,
            };
            let summary = run_sweep(args).await?;
            println!(
                "{}{} of {} cells processed, {} skipped, {} files uploaded to {}",
                if summary.dry_run { "[DRY RUN] " } else { "" },
                summary.processed_cells,
                summary.total_cells,
                summary.skipped_cells,
                summary.uploaded_files,
                summary.remote_dir
            );
        }
        Commands::Grid { sweep, format } => {
            let config = sweep.to_sweep_config()?;
            show_grid(&config, &format)?;
        }
        Commands::Status {
            ledger,
            pointing,
            ccd,
            format,
        } => {
            sweep_status(&ledger, pointing, ccd, &format)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sns_sweep={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<SweepError>()
        .map(SweepError::exit_code)
        .unwrap_or(1)
}
