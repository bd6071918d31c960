//! Outbound side of a channel: the reply being sent and what the provider said about it.

use async_trait::async_trait;
use serde_json::Value;

/// A reply addressed to one user. Built right before sending, never stored.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub recipient: String,
    pub body: String,
}

/// Provider response to a send request that was actually made.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// HTTP status returned by the provider.
    pub status: u16,
    /// Raw provider response (JSON, or the body text as a JSON string when not JSON).
    pub response: Value,
    /// Provider message id (`messages[0].id`), present on success.
    pub message_id: Option<String>,
}

impl SendOutcome {
    /// True only for HTTP 200; any other status means the provider rejected the message.
    pub fn delivered(&self) -> bool {
        self.status == 200
    }
}

/// The send request could not be made at all (as opposed to being rejected).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("whatsapp {0} not configured")]
    NotConfigured(&'static str),
    #[error("whatsapp request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Handle to a channel that can deliver text replies.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "whatsapp").
    fn id(&self) -> &str;
    /// Send one text message. No retry.
    async fn send_text(&self, message: &OutboundMessage) -> Result<SendOutcome, SendError>;
}
