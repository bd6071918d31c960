//! WhatsApp channel: send text messages via the Cloud API (Graph API `/messages`).

use crate::channels::outbound::{ChannelHandle, OutboundMessage, SendError, SendOutcome};
use crate::config::WhatsAppConfig;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const WHATSAPP_API_BASE: &str = "https://graph.facebook.com";

/// WhatsApp Cloud API sender bound to one business phone number.
pub struct WhatsAppChannel {
    id: String,
    token: Option<String>,
    phone_number_id: Option<String>,
    api_base: String,
    api_version: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, SendError> {
        let api_base = config
            .api_base
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| WHATSAPP_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            id: "whatsapp".to_string(),
            token: config.token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            api_base,
            api_version: config.api_version.clone(),
            client,
        })
    }

    /// `{base}/{version}/{phone_number_id}/messages`.
    fn messages_url(&self) -> Result<String, SendError> {
        let phone_number_id = self
            .phone_number_id
            .as_deref()
            .ok_or(SendError::NotConfigured("phone number id"))?;
        Ok(format!(
            "{}/{}/{}/messages",
            self.api_base, self.api_version, phone_number_id
        ))
    }

    /// Send a text message via the `/messages` API.
    /// `Ok` whenever the provider answered; check [`SendOutcome::delivered`].
    pub async fn send_message(&self, to: &str, text: &str) -> Result<SendOutcome, SendError> {
        let token = self
            .token
            .as_deref()
            .ok_or(SendError::NotConfigured("token"))?;
        let url = self.messages_url()?;
        let body = text_message_body(to, text);
        log::info!("whatsapp: sending message to {} ({} chars)", to, text.chars().count());
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let status = res.status().as_u16();
        let raw = res.text().await?;
        let response: Value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        let message_id = response
            .pointer("/messages/0/id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let outcome = SendOutcome {
            status,
            response,
            message_id,
        };
        if outcome.delivered() {
            log::info!(
                "whatsapp: message sent (id {})",
                outcome.message_id.as_deref().unwrap_or("unknown")
            );
        } else {
            log::warn!("whatsapp: send failed: {} {}", status, outcome.response);
        }
        Ok(outcome)
    }
}

/// Fixed request shape for a plain text message.
fn text_message_body(to: &str, text: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": {
            "preview_url": false,
            "body": text
        }
    })
}

#[async_trait]
impl ChannelHandle for WhatsAppChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_text(&self, message: &OutboundMessage) -> Result<SendOutcome, SendError> {
        WhatsAppChannel::send_message(self, &message.recipient, &message.body).await
    }
}
