//! # pillbot-server
//!
//! HTTP server for the pillbot medication-adherence system.
//!
//! This binary provides:
//! - REST API for medicines, dose logs, adherence analytics and accounts
//! - Device-facing endpoints the dispenser polls over the same API
//! - OpenAPI documentation via Swagger UI
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package pillbot-server
//!
//! # Production
//! PILLBOT_ENV=production ./pillbot-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use pillbot_core::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use pillbot_server::{api, logging, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("PILLBOT_ENV").is_ok_and(|v| v == "production");
    logging::init(is_production)?;

    let config_path = ServerConfig::default_path();
    let config = ServerConfig::load_or_default(&config_path)?;
    info!(config = %config_path.display(), "Starting pillbot-server");

    let bind_address = config.bind_address;
    let state = AppState::new(config)?.into_shared();
    let app = api::create_router(state);

    let listener = TcpListener::bind(bind_address).await?;
    info!("Listening on {bind_address}");

    axum::serve(listener, app).await?;

    Ok(())
}
