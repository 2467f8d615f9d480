mod bot;
mod embed;
mod env;
mod log;

pub mod error;
pub mod http;
pub mod invidious;
pub mod link;
pub mod model;
pub mod resolve;
pub mod service;
pub mod spotify;

use anyhow::anyhow;
use serenity::all::{Client, GatewayIntents};
use std::sync::Arc;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DISCORD_INTENTS: GatewayIntents =
    GatewayIntents::non_privileged().union(GatewayIntents::MESSAGE_CONTENT);

pub async fn run() -> anyhow::Result<()> {
    log::initialize_logger().map_err(|error| anyhow!(error))?;

    let config = env::Config::from_env()?;
    let bot = Arc::new(bot::Bot::new(&config).await?);

    let mut client = Client::builder(&config.discord_api_token, DISCORD_INTENTS)
        .event_handler_arc(bot.clone())
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "could not listen for the shutdown signal");
            return;
        }

        info!("shutting down");
        shard_manager.shutdown_all().await;
    });

    let result = client.start().await;
    bot.stop().await;

    Ok(result?)
}
