//! Command line front end for the lead book.

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use leadbook_engine::EngineConfig;

use crate::cli::Cli;
use crate::error::CliError;

fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Engine(err)) => {
            let report = err.report();
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_else(|_| err.to_string())
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let mut config = EngineConfig::from_env()?;
    if let Some(db) = &cli.db {
        config.db_path = db.to_string_lossy().into_owned();
    }
    commands::run(config, cli)
}
