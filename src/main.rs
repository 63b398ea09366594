mod bridge;
mod config;
mod database;
mod dispatcher;
mod error;
mod listener;
mod payload;
mod server;
mod token;
mod tools;

use anyhow::Result;
use config::Config;
use dispatcher::SystemOpener;
use server::McpServer;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("BEAR_BRIDGE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    // Logs go to stderr; stdout carries the JSON-RPC stream.
    init_logging(&config.logging.level);
    log::info!("Starting Bear bridge (config: {})", config_path);
    log::info!(
        "Callbacks on {} (timeout {}ms)",
        config.listener().callback_url(),
        config.callback.timeout_ms
    );

    let opener = Arc::new(SystemOpener::new(config.bear.open_command.clone()));
    let server = McpServer::new(&config, opener);
    server.run_stdio().await?;

    log::info!("Bear bridge stopped");
    Ok(())
}

/// Config level first, `RUST_LOG` on top when set.
fn init_logging(level: &str) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.parse_filters(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}
