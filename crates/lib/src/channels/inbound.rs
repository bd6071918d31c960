//! Inbound message normalization: the automation platform forwards messages in
//! several JSON shapes; reduce them to a sender id and a text body.

use serde_json::{Map, Value};

/// Keys checked for the sender id, in precedence order.
const SENDER_KEYS: [&str; 3] = ["from", "numero", "phone"];

/// A message from the platform, ready to be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender phone number / WhatsApp id; replies are addressed here.
    pub sender_id: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("fields 'from' and 'message' are required (missing: {0})")]
    MissingFields(&'static str),
}

/// Parse a raw request body and normalize it.
pub fn normalize_bytes(body: &[u8]) -> Result<InboundMessage, NormalizeError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| NormalizeError::InvalidJson(e.to_string()))?;
    normalize(&payload)
}

/// Extract sender and body from an arbitrary JSON payload.
pub fn normalize(payload: &Value) -> Result<InboundMessage, NormalizeError> {
    let obj = payload.as_object().ok_or(NormalizeError::NotAnObject)?;
    let sender_id = extract_sender(obj);
    let body = extract_body(obj);
    match (sender_id, body) {
        (Some(sender_id), Some(body)) => Ok(InboundMessage { sender_id, body }),
        (None, Some(_)) => Err(NormalizeError::MissingFields("sender")),
        (Some(_), None) => Err(NormalizeError::MissingFields("message")),
        (None, None) => Err(NormalizeError::MissingFields("sender, message")),
    }
}

/// First present, non-empty sender among `from`, `numero`, `phone`.
/// Numbers are accepted since some platforms send phone numbers unquoted.
fn extract_sender(obj: &Map<String, Value>) -> Option<String> {
    SENDER_KEYS.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Body shapes, first present key wins even when its value is empty:
/// `{"text":{"body":X}}`, `{"message":X}`, `{"mensagem":X}`, `{"text":X}`.
fn extract_body(obj: &Map<String, Value>) -> Option<String> {
    let nested = obj
        .get("text")
        .and_then(Value::as_object)
        .and_then(|t| t.get("body"));
    let value = nested
        .or_else(|| obj.get("message"))
        .or_else(|| obj.get("mensagem"))
        .or_else(|| obj.get("text"))?;
    non_empty_str(value)
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}
