mod config;
mod platform;
mod relay;
mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Cli, Config};
use crate::relay::{Relay, Router};
use crate::webhook::WebhookClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_cli(Cli::parse()).context("Invalid configuration")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},teloxide=warn", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration loaded successfully");
    info!("  Telegram chat ID: {}", config.chat_id);
    info!(
        "  Default webhook host: {}",
        config.default_webhook.host_str().unwrap_or_default()
    );
    if config.destinations.is_empty() {
        info!("  Personal webhooks: none");
    } else {
        info!("  Personal webhooks: {}", config.destinations.len());
    }

    let bot = platform::telegram::bot(&config.telegram_token, config.poll_timeout)?;
    let username = platform::telegram::authorize(&bot).await?;
    info!("Authorized on account {}", username);

    let client = WebhookClient::new(config.delivery_timeout)?;
    let router = Router::new(config.chat_id, config.default_webhook, config.destinations);
    let relay = Arc::new(Relay::new(router, Arc::new(client)));

    platform::telegram::run(bot, relay, config.poll_timeout).await?;

    Ok(())
}
