//! Fractal Forge Application Library
//!
//! Command-line front end of the escape-time compute engine: argument
//! parsing, layered configuration, logging setup and the `info`,
//! `generate` and `benchmark` commands.

pub mod benchmark;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

use anyhow::Result;
use clap::Parser;

pub use config::{load_engine_config, AppConfig, Command};
pub use error::AppError;

/// Entry point shared by the `fractal-forge` binary and the root crate.
#[tokio::main]
pub async fn main() -> Result<()> {
    let app = AppConfig::parse();
    logging::init_logger(app.log_level);
    log::debug!("Parsed arguments: {:?}", app);
    run(app).await
}

/// Runs one parsed command line.
pub async fn run(app: AppConfig) -> Result<()> {
    match app.command {
        Command::Info => commands::info().await,
        Command::Generate(args) => {
            let config = load_engine_config(app.config.as_deref())?;
            commands::generate(config, args).await
        }
        Command::Benchmark(args) => {
            let config = load_engine_config(app.config.as_deref())?;
            commands::benchmark(config, args).await
        }
    }
}
