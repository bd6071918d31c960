//! Route handlers: verification handshake, message delivery, health and info.

use crate::channels::{normalize_bytes, NormalizeError, OutboundMessage, SendError};
use crate::gateway::server::GatewayState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Failures that end a delivery request. Rendered as `{"status":"error","message":...}`.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("could not read request body: {0}")]
    Body(#[from] BytesRejection),
    #[error(transparent)]
    Validation(#[from] NormalizeError),
    #[error("failed to send reply: {0}")]
    SendFailed(#[from] SendError),
    #[error("failed to send reply: provider returned status {0}")]
    SendRejected(u16),
}

impl WebhookError {
    fn status(&self) -> StatusCode {
        match self {
            WebhookError::Body(rejection) => rejection.status(),
            WebhookError::Validation(_) => StatusCode::BAD_REQUEST,
            WebhookError::SendFailed(_) | WebhookError::SendRejected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        error_envelope(self.status(), &self.to_string())
    }
}

/// JSON error body shared by every failing route, including caught panics.
pub(crate) fn error_envelope(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "status": "error",
            "message": message,
        })),
    )
        .into_response()
}

/// Decide the handshake reply: the challenge verbatim when mode is `subscribe` and
/// the token matches, otherwise 403. Accepts `hub.*` names and their short forms.
pub fn verification_response(
    params: &HashMap<String, String>,
    expected_token: &str,
) -> (StatusCode, String) {
    let param = |long: &str, short: &str| {
        params
            .get(long)
            .or_else(|| params.get(short))
            .map(String::as_str)
    };
    let mode = param("hub.mode", "mode");
    let token = param("hub.verify_token", "verify_token");
    let challenge = param("hub.challenge", "challenge");

    let token_matches = token.is_some_and(|t| constant_time_eq(t, expected_token));
    if mode == Some("subscribe") && token_matches {
        log::info!("webhook verification succeeded");
        (StatusCode::OK, challenge.unwrap_or_default().to_string())
    } else {
        log::warn!(
            "webhook verification failed (mode {:?}, token {})",
            mode,
            if token.is_some() { "mismatch" } else { "missing" }
        );
        (StatusCode::FORBIDDEN, "Forbidden".to_string())
    }
}

/// Longest payload excerpt put in a log line.
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Lossy UTF-8 view of a request body, cut to [`PAYLOAD_PREVIEW_CHARS`].
fn payload_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut chars = text.chars();
    let mut preview: String = chars.by_ref().take(PAYLOAD_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        preview.push_str("...");
    }
    preview
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// GET /webhook: provider verification handshake.
pub(crate) async fn verify(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    verification_response(&params, &state.config.gateway.verify_token)
}

/// POST /webhook and POST /: normalize, complete, reply.
pub(crate) async fn deliver(
    State(state): State<GatewayState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, WebhookError> {
    let request_id = uuid::Uuid::new_v4();
    let body = body.map_err(|e| {
        log::warn!("webhook {}: could not read body: {}", request_id, e);
        e
    })?;
    log::info!("webhook {}: message received ({} bytes)", request_id, body.len());
    log::debug!(
        "webhook {}: payload {}",
        request_id,
        String::from_utf8_lossy(&body)
    );

    let inbound = normalize_bytes(&body).map_err(|e| {
        log::warn!(
            "webhook {}: rejected payload ({}): {}",
            request_id,
            e,
            payload_preview(&body)
        );
        e
    })?;
    log::info!(
        "webhook {}: from {}: {:?}",
        request_id,
        inbound.sender_id,
        inbound.body
    );

    let reply = match state.completer.complete(&inbound.body).await {
        Ok(text) => text,
        Err(failure) => {
            log::warn!(
                "webhook {}: completion failed, replying with fallback: {}",
                request_id,
                failure
            );
            failure.fallback_reply()
        }
    };
    log::debug!("webhook {}: reply {:?}", request_id, reply);

    let outbound = OutboundMessage {
        recipient: inbound.sender_id,
        body: reply,
    };
    let outcome = state.channel.send_text(&outbound).await.map_err(|e| {
        log::error!("webhook {}: send to {} failed: {}", request_id, outbound.recipient, e);
        e
    })?;
    if !outcome.delivered() {
        log::error!(
            "webhook {}: provider rejected reply to {}: {} {}",
            request_id,
            outbound.recipient,
            outcome.status,
            outcome.response
        );
        return Err(WebhookError::SendRejected(outcome.status));
    }

    log::info!(
        "webhook {}: reply sent to {} via {}",
        request_id,
        outbound.recipient,
        state.channel.id()
    );
    Ok(Json(json!({
        "status": "success",
        "message": "message processed and reply sent",
        "resposta_enviada": outbound.body,
    })))
}

/// GET /health: fixed liveness body.
pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "WhatsApp webhook relay is running",
    }))
}

/// GET /: route listing.
pub(crate) async fn index() -> Json<Value> {
    Json(json!({
        "app": "WhatsApp Webhook Relay",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "webhook_verification": "GET /webhook",
            "receive_message": "POST /webhook or POST /",
            "health": "GET /health",
        }
    }))
}
