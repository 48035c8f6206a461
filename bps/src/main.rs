// bps/src/main.rs
use std::process;

use bps_common::config::Config;
use bps_common::error::{BpsError, Result as BpsResult};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod cli;
use cli::CliArgs;

fn init_logging(verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("BPS_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

fn main() -> BpsResult<()> {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.verbose);

    let config = Config::load()
        .map_err(|e| BpsError::Config(format!("Could not load config: {e}")))?;
    debug!("Loaded config: {:?}", config);

    if let Err(e) = cli_args.command.run(&config) {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {e:#}");
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}
