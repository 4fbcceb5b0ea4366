//! Telegram Bot API client: the push channel for alerts and the transport
//! of the chat-id listener.

use crate::common::{Result, WatcherError};
use crate::notify::PushChannel;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Extra time granted to a long poll on top of its server-side timeout.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatcherError::Notify(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let request = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&SendMessage { chat_id, text });
        call::<serde_json::Value>(request, "sendMessage").await?;
        Ok(())
    }

    pub async fn send_photo(&self, chat_id: &str, caption: &str, photo: Bytes) -> Result<()> {
        let format = image::guess_format(&photo).unwrap_or(image::ImageFormat::Jpeg);
        let extension = format.extensions_str().first().copied().unwrap_or("jpg");
        let part = Part::bytes(photo.to_vec())
            .file_name(format!("frame.{}", extension))
            .mime_str(format.to_mime_type())
            .map_err(|e| WatcherError::Notify(e.to_string()))?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let request = self.http.post(self.method_url("sendPhoto")).multipart(form);
        call::<serde_json::Value>(request, "sendPhoto").await?;
        Ok(())
    }

    /// Long-poll for updates with id `>= offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let request = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset), ("timeout", timeout.as_secs() as i64)])
            .timeout(timeout + LONG_POLL_GRACE);
        Ok(call::<Vec<Update>>(request, "getUpdates").await?.unwrap_or_default())
    }

    /// Acknowledge everything queued while nobody was polling. Returns the
    /// offset to continue from.
    pub async fn skip_pending(&self) -> Result<i64> {
        let pending = self.get_updates(-1, Duration::ZERO).await?;
        let offset = pending.last().map_or(0, |update| update.update_id + 1);
        if offset > 0 {
            self.get_updates(offset, Duration::ZERO).await?;
        }
        Ok(offset)
    }
}

async fn call<T: serde::de::DeserializeOwned>(request: reqwest::RequestBuilder, method: &str) -> Result<Option<T>> {
    let response = request
        .send()
        .await
        .map_err(|e| WatcherError::Notify(format!("{} failed: {}", method, e.without_url())))?;
    let status = response.status();
    let body: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| WatcherError::Notify(format!("{} returned {}: {}", method, status, e.without_url())))?;

    if !body.ok {
        return Err(WatcherError::Notify(format!(
            "{} rejected: {}",
            method,
            body.description.unwrap_or_else(|| status.to_string())
        )));
    }
    Ok(body.result)
}

#[async_trait]
impl PushChannel for TelegramClient {
    async fn push(&self, destination: &str, text: &str, image: Option<Bytes>) -> Result<()> {
        match image {
            Some(photo) => self.send_photo(destination, text, photo).await,
            None => self.send_message(destination, text).await,
        }
    }
}

/// Reply for a listener command, if the text is one.
pub fn command_reply(text: &str, chat_id: i64) -> Option<String> {
    let command = text.split_whitespace().next()?;
    // Group chats address commands as `/id@bot_name`.
    let command = command.split('@').next().unwrap_or(command);
    match command {
        "/id" => Some(format!("Your chat ID is: {}", chat_id)),
        _ => None,
    }
}
