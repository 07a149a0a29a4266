//! Oracle interfaces consumed by the decision engine.
//!
//! The engine never talks to a model directly. It asks a [`TextOracle`] for
//! free-form text (ASR extraction, condition equivalence, partition
//! proposals) and an [`EmbeddingOracle`] for condition vectors. The
//! [`ProviderGateway`](crate::gateway::ProviderGateway) implements both
//! against Ollama; tests plug in scripted in-memory oracles.

use async_trait::async_trait;

use crate::gateway::ProviderError;

/// Free-form text generation from a system instruction and a user prompt.
///
/// Retries and timeouts belong to the implementation. Callers treat an
/// `Err` as a local failure and fall back.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn generate(&self, instruction: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Text embedding.
///
/// Returns exactly one vector per input text, in input order. A text whose
/// embedding failed is represented by an empty vector.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;
}
