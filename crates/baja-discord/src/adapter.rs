use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use crate::context::BotContext;
use crate::error::DiscordError;
use crate::handler::DiscordHandler;

/// Wraps a serenity `Client` and drives the gateway until the process exits,
/// reconnecting whenever the connection drops.
pub struct DiscordAdapter {
    app: Arc<BotContext>,
}

impl DiscordAdapter {
    pub fn new(app: Arc<BotContext>) -> Result<Self, DiscordError> {
        if app.config.bot_token.trim().is_empty() {
            return Err(DiscordError::Usage("no Discord bot token configured".to_string()));
        }
        Ok(Self { app })
    }

    /// Connect and keep reconnecting. Never returns.
    ///
    /// Scheduled summaries post through the platform's own `Http`, so they
    /// keep running while the gateway is down.
    pub async fn run(self) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        loop {
            let mut client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!("Discord: connect failed ({e}), retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };

            info!("Discord: gateway connecting");
            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            app: Arc::clone(&self.app),
        };
        Client::builder(&self.app.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
