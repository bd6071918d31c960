//! Reply generation: ask the LLM backend for an answer, trying each configured
//! model in order until one succeeds.
//!
//! Failures never escape as errors to the webhook: the caller gets a
//! [`CompletionFailure`] and can turn it into an apologetic reply for the user.

use crate::config::LlmConfig;
use crate::llm::{AnthropicClient, LlmBackend};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Outcome of one completion: reply text or why there is none.
pub type CompletionResult = Result<String, CompletionFailure>;

/// One failed model attempt, kept for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttempt {
    pub model: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionFailure {
    #[error("llm api key not configured")]
    MissingApiKey,
    #[error("no model succeeded ({} attempted)", .attempts.len())]
    AllModelsFailed { attempts: Vec<ModelAttempt> },
    #[error("completion failed unexpectedly: {0}")]
    Internal(String),
}

impl CompletionFailure {
    /// Text sent to the user in place of a model reply.
    pub fn fallback_reply(&self) -> String {
        match self {
            CompletionFailure::MissingApiKey => {
                "Configuration error: the assistant's API key is missing.".to_string()
            }
            CompletionFailure::AllModelsFailed { .. } => {
                "Sorry, no assistant model is available right now. Please try again later."
                    .to_string()
            }
            CompletionFailure::Internal(reason) => {
                format!("Sorry, something went wrong: {}", reason)
            }
        }
    }
}

/// Anything that turns a prompt into a reply. The gateway holds one of these.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> CompletionResult;
}

/// Completion client with a linear model-fallback chain.
pub struct CompletionClient<B> {
    backend: B,
    models: Vec<String>,
    max_tokens: u32,
}

impl CompletionClient<AnthropicClient> {
    /// Build the production client (Anthropic backend) from config.
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let backend = AnthropicClient::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::new(backend, config.models.clone(), config.max_tokens))
    }
}

impl<B: LlmBackend> CompletionClient<B> {
    pub fn new(backend: B, models: Vec<String>, max_tokens: u32) -> Self {
        Self {
            backend,
            models,
            max_tokens,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Try each model once, in order; first success wins.
    async fn try_models(&self, prompt: &str) -> CompletionResult {
        if !self.backend.is_configured() {
            log::error!("completion: api key not configured, skipping llm call");
            return Err(CompletionFailure::MissingApiKey);
        }
        let mut attempts = Vec::with_capacity(self.models.len());
        for model in &self.models {
            log::info!("completion: trying model {}", model);
            match self.backend.complete(model, prompt, self.max_tokens).await {
                Ok(text) => {
                    log::info!("completion: model {} succeeded", model);
                    return Ok(text);
                }
                Err(e) => {
                    log::warn!("completion: model {} failed: {}", model, e);
                    attempts.push(ModelAttempt {
                        model: model.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        log::error!(
            "completion: all {} model(s) failed: {:?}",
            attempts.len(),
            attempts
        );
        Err(CompletionFailure::AllModelsFailed { attempts })
    }
}

#[async_trait]
impl<B: LlmBackend> Completer for CompletionClient<B> {
    async fn complete(&self, prompt: &str) -> CompletionResult {
        match AssertUnwindSafe(self.try_models(prompt)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                log::error!("completion: panicked: {}", reason);
                Err(CompletionFailure::Internal(reason))
            }
        }
    }
}

/// Best-effort message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
