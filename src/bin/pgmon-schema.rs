//! One-shot utility to provision the pgmon database schemas.
//!
//! Usage:
//!   cargo run --bin pgmon-schema
//!
//! Creates the `logs` and `metrics` schemas if they do not already exist.
//! Safe to rerun: existing schemas are skipped, and a failed run leaves no
//! partial schema behind.

use tracing::warn;
use tracing_subscriber::EnvFilter;

use pgmon_gateway::config::Config;
use pgmon_gateway::provision;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pgmon_gateway=debug")),
        )
        .init();

    // Load environment from .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file found or error loading it: {}", e);
    }

    let config = Config::from_env()?;

    if let Err(e) = provision::provision(&config.database_url).await {
        eprintln!("Provisioning aborted: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
