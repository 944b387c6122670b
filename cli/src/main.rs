mod cli;
mod commands;

use anyhow::{Context, Result};
use hazard_exposure::Config;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{config, prepare, run};

/// Install the log subscriber; `RUST_LOG` overrides the `-v` level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hazard_exposure={level},hazex={level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// File or default configuration, then environment overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("[hazex] failed to load configuration {}", path.display()))?,
        None => Config::default(),
    };
    Ok(config.with_env_overrides())
}

pub fn run() -> Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Run(args) => run::run(&cli, args, config),
        Commands::Prepare => prepare::run(&cli, config),
        Commands::Config => config::run(&cli, config),
    }
}

fn main() -> Result<()> { run() }
