//! Provider gateway for Ollama chat completions and embeddings.

pub mod error;
pub mod ollama;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::oracle::{EmbeddingOracle, TextOracle};
use ollama::{ChatProvider, EmbeddingProvider, OllamaAdapter};
use usage::{CallStatus, ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

pub struct ProviderGateway<U: UsageSinkTrait> {
    ollama: OllamaAdapter,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let ollama = OllamaAdapter::from_env()?;
        Ok(Self {
            ollama,
            usage_sink,
            config: GatewayConfig::default(),
        })
    }

    pub fn with_config(ollama: OllamaAdapter, usage_sink: Arc<U>, config: GatewayConfig) -> Self {
        Self {
            ollama,
            usage_sink,
            config,
        }
    }

    pub fn adapter(&self) -> &OllamaAdapter {
        &self.ollama
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            let result = self.ollama.chat(&req).await;
            match result {
                Ok(resp) => {
                    self.record_chat(&req, &resp, CallStatus::Success, None).await;
                    return Ok(resp);
                }
                Err(err) => {
                    let code = err.code().to_string();
                    self.record_chat(&req, &ChatResponse::empty(), CallStatus::Error, Some(code))
                        .await;

                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }

                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    tracing::debug!(attempt, error = %err, ?delay, "retrying chat call");
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::provider("ollama", "unknown error", false)))
    }

    pub async fn embed_batch(&self, req: EmbedRequest) -> Result<EmbedResponse, ProviderError> {
        let result = self.ollama.embed(&req).await;
        let record = ProviderCallRecord::new(
            "ollama",
            "api/embeddings",
            req.model.clone(),
            req.attribution.caller,
        );
        match &result {
            Ok(resp) => {
                let record = record.latency(resp.latency.as_millis() as u64);
                let record = if resp.failures > 0 {
                    record.error(format!("{}_of_{}_failed", resp.failures, req.texts.len()))
                } else {
                    record
                };
                self.usage_sink.record(record).await;
            }
            Err(err) => {
                self.usage_sink.record(record.error(err.code())).await;
            }
        }
        result
    }

    async fn record_chat(
        &self,
        req: &ChatRequest,
        resp: &ChatResponse,
        status: CallStatus,
        error_code: Option<String>,
    ) {
        let record = ProviderCallRecord::new(
            req.model.provider(),
            "api/chat",
            req.model.model_id(),
            req.attribution.caller,
        )
        .tokens(resp.input_tokens, resp.output_tokens)
        .latency(resp.latency.as_millis() as u64);

        let record = if status == CallStatus::Error {
            record.error(error_code.unwrap_or_else(|| "provider_error".to_string()))
        } else {
            record
        };

        self.usage_sink.record(record).await;
    }
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> TextOracle for ProviderGateway<U> {
    async fn generate(&self, instruction: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest::new(
            ChatModel::ollama(self.ollama.chat_model()),
            vec![Message::system(instruction), Message::user(prompt)],
            Attribution::new("oracle::generate"),
        );
        let response = self.chat(request).await?;
        Ok(response.content)
    }
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> EmbeddingOracle for ProviderGateway<U> {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let request = EmbedRequest::new(
            self.ollama.embed_model(),
            texts.to_vec(),
            Attribution::new("oracle::embed"),
        );
        match self.embed_batch(request).await {
            Ok(resp) => resp.embeddings,
            Err(err) => {
                tracing::warn!(error = %err, "embedding request failed; returning empty vectors");
                vec![Vec::new(); texts.len()]
            }
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}
