//! OpenAI-compatible API provider.
//!
//! Works with any `/chat/completions` endpoint; configured for Groq by default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;
use yamato_core::{
    config::ProviderConfig,
    context::{ApiMessage, Completion, Context},
    error::YamatoError,
    traits::Provider,
};

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    /// Create from config values. The timeout applies to each request.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self, YamatoError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| YamatoError::Provider(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }

    fn build_request(&self, context: &Context) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: context.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: context.to_api_messages(),
            temperature: context.temperature.unwrap_or(self.temperature),
            max_tokens: context.max_tokens.unwrap_or(self.max_tokens),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ApiMessage>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: Option<u64>,
}

impl ChatCompletionResponse {
    fn first_content(&self) -> Option<&str> {
        self.choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.as_str())
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, context: &Context) -> Result<Completion, YamatoError> {
        let body = self.build_request(context);
        let start = Instant::now();

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("openai: POST {url} model={}", body.model);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| YamatoError::Provider(format!("openai request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(YamatoError::Provider(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp.json().await.map_err(|e| {
            YamatoError::Provider(format!("openai: failed to parse response: {e}"))
        })?;

        let text = parsed
            .first_content()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| YamatoError::Provider("openai: empty completion".into()))?
            .to_string();

        Ok(Completion {
            text,
            model: parsed.model,
            tokens_used: parsed.usage.as_ref().and_then(|u| u.total_tokens),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
