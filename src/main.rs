//! Council Forum Server
//!
//! Threads, polls, reputation and activity feeds

use std::sync::Arc;

use council_forum::config::Config;
use council_forum::server::AppState;
use council_forum::storage::ForumStorage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Council Forum Server");

    let config = Config::load()?;

    let db_path = config.database_path();
    let storage = Arc::new(ForumStorage::new(&db_path)?);
    info!("SQLite storage initialized at {}", db_path);

    let state = Arc::new(AppState::new(storage, config.reputation));

    // Env vars take precedence over config.toml
    let host = std::env::var("COUNCIL_HOST").unwrap_or_else(|_| config.server.host.clone());
    let port: u16 = std::env::var("COUNCIL_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(config.server.port);

    council_forum::server::run_server(&host, port, state).await?;

    Ok(())
}
