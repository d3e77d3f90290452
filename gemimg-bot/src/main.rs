//! gemimg - Main entry point.

use anyhow::Result;
use gemimg_api::{GeminiClient, ResilientApi};
use gemimg_bot::{CliChannel, PluginHandler};
use gemimg_common::config::Config;
use gemimg_common::logging::init_logging;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("gemimg v{}", env!("CARGO_PKG_VERSION"));

    let client = GeminiClient::new(&config)?;
    let api = Arc::new(ResilientApi::new(Arc::new(client), config.retry.clone()));
    let handler = Arc::new(PluginHandler::new(config, api)?);

    CliChannel::new(handler).run().await?;
    Ok(())
}
