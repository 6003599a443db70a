//! roomcast - room-based realtime chat daemon.
//!
//! WebSocket clients register a username, join group or direct rooms, and
//! exchange messages with presence and mention-notification pushes; an HTTP
//! surface serves history, presence, and notification queries.

mod config;
mod db;
mod error;
mod events;
mod handlers;
mod http;
mod metrics;
mod network;
mod rooms;
mod state;

use crate::config::Config;
use crate::db::Database;
use crate::network::Gateway;
use crate::state::SessionRegistry;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(server = %config.server.name, "Starting roomcast");

    metrics::init();

    // Initialize database
    let db_path = config
        .database
        .as_ref()
        .map(|d| d.path.as_str())
        .unwrap_or("chat.db");
    let db = Database::new(db_path).await?;

    // Shared live-session state
    let registry = Arc::new(SessionRegistry::new());

    // HTTP read API + /metrics
    let api_state = http::ApiState::new(Arc::clone(&registry), db.clone());
    tokio::spawn(http::run_http_server(config.http.address, api_state));

    // WebSocket gateway
    let gateway = Gateway::bind(config.listen.address, config.tls.clone(), registry, db).await?;
    gateway.run().await
}
