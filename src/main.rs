use anyhow::Result;
use log::{error, info};
use std::sync::Arc;

use groupwarden::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Starting GroupWarden v{}", groupwarden::VERSION);

    // =================================================================
    // CONFIGURATION
    // =================================================================

    let config_manager = ConfigurationManager::from_env();
    if let Err(e) = config_manager.initialize().await {
        error!("Failed to initialize configuration system: {}", e);
        return Err(e);
    }
    let config = config_manager.get_bot_config().await;
    info!(
        "Configuration loaded from {} (data file: {})",
        config_manager.config_dir().display(),
        config.storage.data_file.display()
    );

    // =================================================================
    // BOT CORE
    // =================================================================

    let store = Arc::new(FileStateStore::new(&config.storage.data_file));
    let gateway = ConsoleGateway::new(ConsoleConfig::from_env()?);

    let bot = Arc::new(ModerationBot::new(&config, Box::new(gateway), store).await?);
    bot.start().await?;

    if config.web.enabled {
        bot.clone().start_web_dashboard(config.web.port).await?;
    }

    info!("{} is running. Press Ctrl+C to stop.", config.core.bot_name);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    bot.shutdown().await?;

    Ok(())
}
