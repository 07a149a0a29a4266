//! Core types for the oracle gateway.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// ATTRIBUTION
// =============================================================================

/// Attribution for usage tracking and debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct Attribution {
    /// Which code path made this call, for debugging.
    /// Use a static string like "grouping::equivalence" or "partition::propose".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self { caller }
    }
}

// =============================================================================
// CHAT TYPES
// =============================================================================

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat model specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatModel {
    /// Locally served Ollama model, e.g. "llama3.1".
    Ollama(String),
}

impl ChatModel {
    pub fn ollama(model_id: impl Into<String>) -> Self {
        ChatModel::Ollama(model_id.into())
    }

    pub fn model_id(&self) -> &str {
        match self {
            ChatModel::Ollama(id) => id,
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            ChatModel::Ollama(_) => "ollama",
        }
    }
}

/// Request for chat completion.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model to use.
    pub model: ChatModel,
    /// Messages in the conversation.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Attribution for usage tracking.
    pub attribution: Attribution,
}

impl ChatRequest {
    pub fn new(model: ChatModel, messages: Vec<Message>, attribution: Attribution) -> Self {
        Self {
            model,
            messages,
            temperature: 0.0,
            max_tokens: None,
            attribution,
        }
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Unknown(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(other) => FinishReason::Unknown(other.to_string()),
            None => FinishReason::Unknown("none".to_string()),
        }
    }
}

/// Response from chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Generated content.
    pub content: String,
    /// Input tokens consumed (Ollama `prompt_eval_count`).
    pub input_tokens: u32,
    /// Output tokens generated (Ollama `eval_count`).
    pub output_tokens: u32,
    /// Time taken for the request.
    pub latency: Duration,
    /// Why the model stopped.
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    pub(crate) fn empty() -> Self {
        Self {
            content: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            latency: Duration::from_millis(0),
            finish_reason: FinishReason::Unknown("error".to_string()),
        }
    }
}

// =============================================================================
// EMBEDDING TYPES
// =============================================================================

/// Request to embed texts.
#[derive(Debug, Clone)]
pub struct EmbedRequest {
    /// Embedding model id.
    pub model: String,
    /// Texts to embed. Each text produces one embedding vector.
    pub texts: Vec<String>,
    /// Attribution for usage tracking.
    pub attribution: Attribution,
}

impl EmbedRequest {
    pub fn new(model: impl Into<String>, texts: Vec<String>, attribution: Attribution) -> Self {
        Self {
            model: model.into(),
            texts,
            attribution,
        }
    }
}

/// Response from an embedding request.
#[derive(Debug, Clone)]
pub struct EmbedResponse {
    /// Embedding vectors, one per input text. A text whose embedding failed
    /// is represented by an empty vector.
    pub embeddings: Vec<Vec<f32>>,
    /// Number of texts whose embedding failed.
    pub failures: usize,
    /// Time taken for the whole request.
    pub latency: Duration,
}
