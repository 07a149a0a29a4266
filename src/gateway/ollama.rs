//! Ollama adapter for chat completions and embeddings.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{ErrorContext, ProviderError};
use super::types::*;

// =============================================================================
// TRAITS
// =============================================================================

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Trait for embedding providers.
///
/// A failure for an individual text is not an error: that slot of the
/// response holds an empty vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, req: &EmbedRequest) -> Result<EmbedResponse, ProviderError>;
}

// =============================================================================
// OLLAMA ADAPTER
// =============================================================================

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.1";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Maximum allowed response body length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed input characters across all messages.
const MAX_INPUT_CHARS: usize = 500_000;

/// Ollama HTTP API adapter.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
    chat_model: String,
    embed_model: String,
}

impl OllamaAdapter {
    /// Create against a base URL with the default model names.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(
            base_url,
            DEFAULT_MODEL,
            DEFAULT_MODEL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create from environment variables.
    ///
    /// `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `OLLAMA_EMBED_MODEL` (defaults to the
    /// chat model) and `OLLAMA_TIMEOUT_SECONDS`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let chat_model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let embed_model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| chat_model.clone());

        let timeout = std::env::var("OLLAMA_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self::with_config(base_url, chat_model, embed_model, timeout)
    }

    /// Create with custom configuration.
    pub fn with_config(
        base_url: impl Into<String>,
        chat_model: impl Into<String>,
        embed_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProviderError::config("Ollama base URL is empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            chat_model: chat_model.into(),
            embed_model: embed_model.into(),
        })
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether the server answers its model listing endpoint.
    pub async fn health_check(&self) -> bool {
        match self.client.get(self.url("/api/tags")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Read the body while enforcing the response size limit.
    async fn read_body(mut response: reqwest::Response) -> Result<String, ProviderError> {
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ProviderError::provider(
                    "ollama",
                    format!("Response too large: {new_len} bytes"),
                    false,
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    fn status_error(status: u16, body: &str, endpoint: &str) -> ProviderError {
        let ctx = ErrorContext::new()
            .with_status(status)
            .with_endpoint(endpoint);

        if status == 429 {
            return ProviderError::rate_limited(Duration::from_secs(1), ctx);
        }

        let message = serde_json::from_str::<ApiError>(body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| format!("HTTP {status}"));

        ProviderError::provider_with_context("ollama", message, status >= 500, ctx)
    }

    async fn embed_one(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let api_req = EmbeddingApiRequest {
            model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.url("/api/embeddings"))
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();
        let body = Self::read_body(response).await?;

        if !status.is_success() {
            return Err(Self::status_error(status.as_u16(), &body, "/api/embeddings"));
        }

        let parsed: EmbeddingApiResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::provider("ollama", format!("Invalid JSON: {e}"), false)
        })?;

        Ok(parsed
            .embedding
            .unwrap_or_default()
            .into_iter()
            .map(|v| v as f32)
            .collect())
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatApiOptions,
}

#[derive(Serialize)]
struct ChatApiOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    message: Option<ChoiceMessage>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingApiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingApiResponse {
    embedding: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct ApiError {
    error: Option<String>,
}

// =============================================================================
// PROVIDER IMPLS
// =============================================================================

#[async_trait]
impl ChatProvider for OllamaAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let total_chars: usize = req.messages.iter().map(|m| m.content.len()).sum();

        if total_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "Input too large: {total_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let start = Instant::now();

        let api_req = ChatApiRequest {
            model: req.model.model_id(),
            messages: &req.messages,
            stream: false,
            options: ChatApiOptions {
                temperature: req.temperature,
                num_predict: req.max_tokens,
            },
        };

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();
        let body = Self::read_body(response).await?;

        if !status.is_success() {
            return Err(Self::status_error(status.as_u16(), &body, "/api/chat"));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::provider("ollama", format!("Invalid JSON: {e}"), false)
        })?;

        if let Some(message) = parsed.error {
            return Err(ProviderError::provider("ollama", message, false));
        }

        let content = parsed
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| ProviderError::provider("ollama", "No message in response", false))?;

        Ok(ChatResponse {
            content,
            input_tokens: parsed.prompt_eval_count.unwrap_or(0),
            output_tokens: parsed.eval_count.unwrap_or(0),
            latency: start.elapsed(),
            finish_reason: FinishReason::from(parsed.done_reason),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaAdapter {
    async fn embed(&self, req: &EmbedRequest) -> Result<EmbedResponse, ProviderError> {
        let start = Instant::now();
        let mut embeddings = Vec::with_capacity(req.texts.len());
        let mut failures = 0;

        // The endpoint embeds one prompt per call.
        for text in &req.texts {
            match self.embed_one(&req.model, text).await {
                Ok(vector) => {
                    if vector.is_empty() {
                        failures += 1;
                    }
                    embeddings.push(vector);
                }
                Err(err) => {
                    warn!(error = %err, caller = req.attribution.caller, "embedding failed");
                    failures += 1;
                    embeddings.push(Vec::new());
                }
            }
        }

        Ok(EmbedResponse {
            embeddings,
            failures,
            latency: start.elapsed(),
        })
    }
}
