mod bot;
mod command;
mod embed;
pub mod env;
pub mod log;
mod model;
mod player;
mod query;
mod recommendation;
#[cfg(test)]
mod testing;
mod youtube;

use crate::bot::Bot;
use crate::env::Config;
use serenity::all::{Client, GatewayIntents};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs the bot until the client stops or the process receives Ctrl-C.
pub async fn run(config: Config) -> Result<(), serenity::Error> {
    let http_client = reqwest::Client::new();
    let resolver = Arc::new(youtube::Resolver::new(
        http_client.clone(),
        config.resolve_timeout,
        config.download_directory,
    ));
    let command_executor = command::Executor::new(http_client, resolver, config.command_prefix);

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(Bot::new(command_executor))
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    let client_task = tokio::spawn(async move { client.start().await });

    tokio::select! {
        result = client_task => match result {
            Ok(Err(error)) => error!("the client stopped: {error}"),
            Err(error) => error!("the client task failed: {error}"),
            Ok(Ok(())) => info!("the client stopped"),
        },
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                error!("could not listen for Ctrl-C: {error}");
            }
            info!("received Ctrl-C, shutting down");
            shard_manager.shutdown_all().await;
        }
    }

    Ok(())
}
