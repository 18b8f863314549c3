mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run_app(cli) {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn configure_threads(threads: Option<usize>) -> Result<()> {
    let Some(num_threads) = threads else {
        return Ok(());
    };
    info!("Using {} worker thread(s) for conformer conversion.", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e)))
}

fn run_app(cli: Cli) -> Result<()> {
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;
    info!("rotlib CLI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Parsed arguments: {:?}", &cli);
    configure_threads(cli.threads)?;

    let result = match cli.command {
        Commands::Build(args) => commands::build::run(args, !cli.quiet),
    };
    if let Err(e) = &result {
        error!("Build failed: {}", e);
    } else {
        info!("Build finished.");
    }
    result
}
