//! CLI command definitions and dispatch.

pub mod dispute;
pub mod job;
pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

use upkeep_core::config::AppConfig;
use upkeep_core::error::AppError;
use upkeep_database::DatabasePool;

use crate::output::OutputFormat;

/// Upkeep: marketplace background maintenance
#[derive(Debug, Parser)]
#[command(name = "upkeep", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay (`config/<env>.toml`)
    #[arg(short, long, env = "UPKEEP_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the scheduler and health server
    Serve(serve::ServeArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Inspect and run maintenance jobs
    Job(job::JobArgs),
    /// Dispute administration
    Dispute(dispute::DisputeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = AppConfig::load(&self.config, &self.env)?;
        match &self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Job(args) => job::execute(args, &config, self.format).await,
            Commands::Dispute(args) => dispute::execute(args, &config, self.format).await,
        }
    }
}

/// Helper: connect to the configured database
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}
