//! Anthropic Messages API client (https://api.anthropic.com by default).
//! Non-streaming, single-turn.

use crate::llm::{LlmBackend, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic HTTP API.
#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    /// POST /v1/messages: non-streaming completion.
    pub async fn messages(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> Result<MessagesResponse, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Api("api key not configured".to_string()))?;
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: model.to_string(),
            max_tokens,
            messages,
        };
        let res = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: MessagesResponse = res.json().await?;
        Ok(data)
    }
}

#[async_trait]
impl LlmBackend for AnthropicClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let res = self
            .messages(model, vec![ChatMessage::user(prompt)], max_tokens)
            .await?;
        log::debug!(
            "anthropic: reply from {} ({} content block(s))",
            res.model.as_deref().unwrap_or(model),
            res.content.len()
        );
        res.first_text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

/// One block of the response `content` list. Only text blocks carry `text`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub model: Option<String>,
}

impl MessagesResponse {
    /// Text of the first content block, if it is a text block.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .first()
            .filter(|b| b.typ == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_single_user_turn() {
        let body = MessagesRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 1024,
            messages: vec![ChatMessage::user("hello")],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "model": "claude-3-5-sonnet-20241022",
                "max_tokens": 1024,
                "messages": [{ "role": "user", "content": "hello" }]
            })
        );
    }

    #[test]
    fn first_text_reads_first_block() {
        let res: MessagesResponse = serde_json::from_str(
            r#"{"id":"msg_1","model":"m","content":[{"type":"text","text":"hi there"},{"type":"text","text":"second"}]}"#,
        )
        .unwrap();
        assert_eq!(res.first_text(), Some("hi there"));
    }

    #[test]
    fn non_text_first_block_has_no_text() {
        let res: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"tool_use","id":"toolu_1","name":"x","input":{},"text":"stray"}]}"#,
        )
        .unwrap();
        assert_eq!(res.first_text(), None);
    }

    #[test]
    fn empty_content_has_no_text() {
        let res: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert_eq!(res.first_text(), None);
    }

    #[test]
    fn blank_api_key_is_not_configured() {
        let c = AnthropicClient::new(None, Some("  ".to_string()), Duration::from_secs(5)).unwrap();
        assert!(!c.is_configured());
        let c = AnthropicClient::new(None, Some("sk-ant".to_string()), Duration::from_secs(5)).unwrap();
        assert!(c.is_configured());
    }
}
