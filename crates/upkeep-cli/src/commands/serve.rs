//! Start the scheduler and health server.

use clap::Args;

use upkeep_core::config::AppConfig;
use upkeep_core::error::AppError;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the server host
    #[arg(long)]
    pub host: Option<String>,

    /// Skip database migrations on startup
    #[arg(long)]
    pub no_migrate: bool,

    /// Serve health only; do not start the scheduler
    #[arg(long)]
    pub no_worker: bool,
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, mut config: AppConfig) -> Result<(), AppError> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if args.no_worker {
        config.worker.enabled = false;
    }

    println!("Starting Upkeep...");
    println!("  Host: {}", config.server.host);
    println!("  Port: {}", config.server.port);
    println!("  Lock backend: {}", config.worker.lock_backend);

    let db = super::connect(&config).await?;

    if !args.no_migrate {
        upkeep_database::migration::run_migrations(db.pool()).await?;
        println!("  Migrations applied successfully.");
    }

    upkeep_api::run_server(config, db).await
}
