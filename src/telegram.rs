//! Telegram Bot API client
//!
//! Delivers digests (`sendMessage`) and CSV exports (`sendDocument`), and
//! long-polls `getUpdates` for the command listener.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::error::ScreenerError;
use crate::storage_utils::{Credentials, TelegramConfig};

pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
const TRUNCATION_MARKER: &str = "\n…(truncated)";

/// Destination for finished reports. One attempt per call, no retry.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ScreenerError>;

    async fn send_document(
        &self,
        chat_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ScreenerError>;
}

#[derive(Deserialize, Debug)]
struct ApiReply<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

pub struct TelegramBot {
    client: Client,
    api_base: String,
    token: String,
    request_timeout: Duration,
}

impl TelegramBot {
    pub fn new(config: &TelegramConfig, credentials: &Credentials) -> Result<Self, ScreenerError> {
        let token = credentials
            .bot_token
            .clone()
            .ok_or(ScreenerError::MissingCredentials("TELEGRAM_BOT_TOKEN"))?;
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ScreenerError::Delivery)?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            request_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Long-polls for new updates. `offset` is one past the last handled
    /// `update_id`, which also acknowledges everything before it.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        poll_timeout_secs: u64,
    ) -> Result<Vec<Update>, ScreenerError> {
        let mut query = vec![("timeout", poll_timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            // the server holds the request open for up to `poll_timeout_secs`
            .timeout(self.request_timeout + Duration::from_secs(poll_timeout_secs))
            .send()
            .await
            .map_err(ScreenerError::Delivery)?;

        Ok(read_reply::<Vec<Update>>(response).await?.unwrap_or_default())
    }
}

async fn read_reply<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ScreenerError> {
    let status = response.status();
    let reply: ApiReply<T> = response.json().await.map_err(ScreenerError::Delivery)?;

    if !reply.ok || !status.is_success() {
        return Err(ScreenerError::DeliveryRejected(
            reply.description.unwrap_or_else(|| status.to_string()),
        ));
    }
    Ok(reply.result)
}

/// Cuts `text` to at most `limit` UTF-16 code units, marking the cut.
///
/// Telegram measures message length in UTF-16, so an emoji outside the basic
/// plane costs two units.
pub fn clamp_message(text: &str, limit: usize) -> String {
    if text.encode_utf16().count() <= limit {
        return text.to_string();
    }
    let budget = limit.saturating_sub(TRUNCATION_MARKER.encode_utf16().count());

    let mut used = 0;
    let mut clamped = String::new();
    for c in text.chars() {
        used += c.len_utf16();
        if used > budget {
            break;
        }
        clamped.push(c);
    }
    clamped.push_str(TRUNCATION_MARKER);
    clamped
}

#[async_trait]
impl DeliverySink for TelegramBot {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ScreenerError> {
        let text = clamp_message(text, TELEGRAM_MESSAGE_LIMIT);
        if text.ends_with(TRUNCATION_MARKER) {
            warn!("Digest exceeded {} UTF-16 units and was truncated", TELEGRAM_MESSAGE_LIMIT);
        }

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(ScreenerError::Delivery)?;

        read_reply::<serde_json::Value>(response).await?;
        debug!("sendMessage accepted for chat {}", chat_id);
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ScreenerError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(ScreenerError::Delivery)?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(ScreenerError::Delivery)?;

        read_reply::<serde_json::Value>(response).await?;
        debug!("sendDocument {} accepted for chat {}", file_name, chat_id);
        Ok(())
    }
}
