//! OpenAI-compatible chat completions client (OpenRouter by default).

use async_trait::async_trait;
use pv_core::config::LlmConfig;
use pv_core::{PvError, Turn};
use pv_session::LanguageModel;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<i64>,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig) -> pv_core::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PvError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    async fn send(&self, context: &[Turn]) -> pv_core::Result<String> {
        let start = Instant::now();
        tracing::info!(model = %self.model, messages = context.len(), "sending request to LLM");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model: &self.model, messages: context })
            .send()
            .await
            .map_err(|e| PvError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PvError::Upstream(format!("API error ({}): {}", status.as_u16(), error_text)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PvError::Upstream(format!("failed to parse response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| PvError::Upstream("LLM returned empty response".into()))?;

        tracing::info!(
            model = %self.model,
            response_len = content.chars().count(),
            total_tokens = body.usage.and_then(|u| u.total_tokens),
            latency_ms = start.elapsed().as_millis() as u64,
            "received response from LLM"
        );
        Ok(content)
    }
}
