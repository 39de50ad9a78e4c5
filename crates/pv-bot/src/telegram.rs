//! Minimal Telegram Bot API client: long polling in, plain text out.

use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Server-side wait for `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;
/// Telegram's per-message text limit.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: TgChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building Telegram HTTP client")?;
        Ok(Self { client, token: token.into(), api_base: TELEGRAM_API_BASE.to_string() })
    }

    /// Point at a different server (tests, self-hosted Bot API).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Updates with id >= `offset`, waiting up to `timeout_secs` for one to arrive.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> anyhow::Result<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let resp = self.client.post(self.api_url("getUpdates")).json(&body).send().await?;
        let status = resp.status();
        let data: ApiResponse<Vec<Update>> =
            resp.json().await.with_context(|| format!("decoding getUpdates ({status})"))?;
        if !data.ok {
            anyhow::bail!(
                "Telegram getUpdates failed: {}",
                data.description.unwrap_or_else(|| status.to_string())
            );
        }
        Ok(data.result.unwrap_or_default())
    }

    /// Send plain text, split into as many messages as Telegram requires.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let body = serde_json::json!({ "chat_id": chat_id, "text": chunk });
            let resp = self.client.post(self.api_url("sendMessage")).json(&body).send().await?;
            if !resp.status().is_success() {
                let status = resp.status();
                let error_text = resp.text().await.unwrap_or_default();
                anyhow::bail!("Telegram sendMessage failed ({status}): {error_text}");
            }
        }
        Ok(())
    }
}

/// Split on char boundaries, preferring paragraph, line, then word breaks.
pub fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = message;

    while remaining.chars().count() > max_chars {
        let hard = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..hard];
        let split = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .unwrap_or(hard);

        chunks.push(remaining[..split].to_string());
        remaining = remaining[split..].trim_start();
    }
    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}
