//! Upkeep server: scheduled marketplace maintenance with a health endpoint.

use tracing_subscriber::{EnvFilter, fmt};

use upkeep_core::config::AppConfig;
use upkeep_core::error::AppError;
use upkeep_database::DatabasePool;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay and `UPKEEP__` variables
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("UPKEEP_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("UPKEEP_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Upkeep v{}", env!("CARGO_PKG_VERSION"));

    let db = DatabasePool::connect(&config.database).await?;
    upkeep_database::migration::run_migrations(db.pool()).await?;

    upkeep_api::run_server(config, db).await
}
