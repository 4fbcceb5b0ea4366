//! Tells users the chat id to paste into their notification settings.

use watcher::common::config::{NotifyConfig, TELEGRAM_TOKEN_ENV};
use watcher::notify::telegram::{command_reply, TelegramClient};

use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "watcher-telegram-bot")]
#[command(about = "Answers /id with the chat id used for Watcher alerts")]
struct Args {
    /// Bot token
    #[arg(long, env = TELEGRAM_TOKEN_ENV, hide_env_values = true)]
    token: Option<String>,

    /// Bot API base URL
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let Some(token) = args.token.filter(|t| !t.trim().is_empty()) else {
        bail!("No bot token, pass --token or set {}", TELEGRAM_TOKEN_ENV);
    };
    let defaults = NotifyConfig::default();
    let api_url = args.api_url.unwrap_or(defaults.telegram_api_url);
    let client = TelegramClient::new(&api_url, &token, Duration::from_millis(defaults.timeout_ms))?;

    let mut offset = client.skip_pending().await?;
    info!("Listening for /id commands");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            result = client.get_updates(offset, POLL_TIMEOUT) => {
                let updates = match result {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!("Polling failed: {}", e);
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(message) = update.message else { continue };
                    let Some(reply) = message.text.as_deref().and_then(|text| command_reply(text, message.chat.id)) else {
                        continue;
                    };
                    debug!(chat = message.chat.id, "Answering /id");
                    if let Err(e) = client.send_message(&message.chat.id.to_string(), &reply).await {
                        warn!(chat = message.chat.id, "Reply failed: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}
