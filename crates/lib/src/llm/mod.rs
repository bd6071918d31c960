//! LLM abstraction and Anthropic Messages client.
//!
//! A backend answers a single-turn prompt with a given model; model selection and
//! fallback live in [`crate::agent`].

mod anthropic;

pub use anthropic::{AnthropicClient, ChatMessage, ContentBlock, MessagesResponse};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
    #[error("llm response had no text content")]
    EmptyResponse,
}

/// A completion API that can be asked for one reply from a named model.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// False when no credentials are configured; callers must not attempt requests.
    fn is_configured(&self) -> bool;

    /// Single user message in, reply text out.
    async fn complete(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}
