//! broker-migrate Binary
//!
//! Command-line entry point for the broker store migration.

use broker_store_migrator::cli::{map_error, Cli, RunContext};
use broker_store_migrator::config::{ConfigLoader, MigratorConfig};
use broker_store_migrator::error::ConfigError;
use broker_store_migrator::logging::init_logging;
use clap::Parser;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    // Initialize logging early
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(dry_run = cli.dry_run, "migrating");

    let context = match RunContext::new(&config, cli.dry_run) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "invalid-configuration");
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    match context.execute() {
        Ok(report) => {
            info!("ends");
            println!("{}", report.render());
        }
        Err(e) => {
            error!(error = %e, "failed-to-migrate");
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

/// Build configuration from the config file, environment, and CLI flags.
/// Precedence: CLI flags override environment override config file override defaults.
fn build_config(cli: &Cli) -> Result<MigratorConfig, ConfigError> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    Ok(config)
}
