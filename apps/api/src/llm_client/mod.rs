/// LLM client: the single point of entry for all text and image generation calls.
///
/// No other module may call a provider API directly. Anthropic is used when
/// `ANTHROPIC_API_KEY` is set, otherwise OpenAI; cover images always go to OpenAI.
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

pub const ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";
pub const IMAGE_MODEL: &str = "dall-e-3";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no LLM provider configured (set ANTHROPIC_API_KEY or OPENAI_API_KEY)")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Both providers nest the message under `error.message`.
#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    anthropic_key: Option<String>,
    openai_key: Option<String>,
    model_override: Option<String>,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            anthropic_key: config.anthropic_api_key.clone(),
            openai_key: config.openai_api_key.clone(),
            model_override: config.model.clone(),
        })
    }

    pub fn provider(&self) -> Option<Provider> {
        if self.anthropic_key.is_some() {
            Some(Provider::Anthropic)
        } else if self.openai_key.is_some() {
            Some(Provider::OpenAi)
        } else {
            None
        }
    }

    pub fn model(&self) -> Option<&str> {
        let default = match self.provider()? {
            Provider::Anthropic => ANTHROPIC_MODEL,
            Provider::OpenAi => OPENAI_MODEL,
        };
        Some(self.model_override.as_deref().unwrap_or(default))
    }

    pub fn can_generate_images(&self) -> bool {
        self.openai_key.is_some()
    }

    /// Sends one prompt to the configured provider and returns the text reply.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let provider = self.provider().ok_or(LlmError::NotConfigured)?;
        let model = self.model().ok_or(LlmError::NotConfigured)?;

        let text = match provider {
            Provider::Anthropic => {
                let key = self.anthropic_key.as_deref().ok_or(LlmError::NotConfigured)?;
                let body = AnthropicRequest {
                    model,
                    max_tokens: MAX_TOKENS,
                    system,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                };
                let response: AnthropicResponse = self
                    .send_with_retry(|| {
                        self.client
                            .post(ANTHROPIC_API_URL)
                            .header("x-api-key", key)
                            .header("anthropic-version", ANTHROPIC_VERSION)
                            .json(&body)
                    })
                    .await?;
                response
                    .content
                    .into_iter()
                    .find(|b| b.block_type == "text")
                    .and_then(|b| b.text)
            }
            Provider::OpenAi => {
                let key = self.openai_key.as_deref().ok_or(LlmError::NotConfigured)?;
                let body = OpenAiRequest {
                    model,
                    max_tokens: MAX_TOKENS,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                };
                let response: OpenAiResponse = self
                    .send_with_retry(|| self.client.post(OPENAI_CHAT_URL).bearer_auth(key).json(&body))
                    .await?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
            }
        };

        let text = text.filter(|t| !t.trim().is_empty()).ok_or(LlmError::EmptyContent)?;
        debug!(?provider, chars = text.len(), "LLM call succeeded");
        Ok(text)
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let text = self.call(prompt, system).await?;
        serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
    }

    /// Generates one cover image and returns its hosted URL.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, LlmError> {
        let key = self.openai_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let body = ImageRequest {
            model: IMAGE_MODEL,
            prompt,
            n: 1,
            size: "1792x1024",
        };
        let response: ImageResponse = self
            .send_with_retry(|| self.client.post(OPENAI_IMAGES_URL).bearer_auth(key).json(&body))
            .await?;
        response
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or(LlmError::EmptyContent)
    }

    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn send_with_retry<T, F>(&self, build: F) -> Result<T, LlmError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response.json().await?);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}
