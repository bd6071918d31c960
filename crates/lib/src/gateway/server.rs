//! Gateway HTTP server: shared state, router and the serve loop.

use crate::agent::{self, Completer, CompletionClient};
use crate::channels::{ChannelHandle, WhatsAppChannel};
use crate::config::{self, Config};
use crate::gateway::webhook;
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

/// Shared, read-only state for the handlers: config plus the two upstream clients.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Produces the reply text (model-fallback client in production).
    pub completer: Arc<dyn Completer>,
    /// Delivers the reply to the user (WhatsApp in production).
    pub channel: Arc<dyn ChannelHandle>,
}

impl GatewayState {
    pub fn new(
        config: Config,
        completer: Arc<dyn Completer>,
        channel: Arc<dyn ChannelHandle>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            completer,
            channel,
        }
    }

    /// Build production clients (Anthropic + WhatsApp Cloud API) from config.
    pub fn from_config(config: Config) -> Result<Self> {
        match config.llm_api_key() {
            Some(key) => log::info!("llm api key present: {}", config::mask_secret(key)),
            None => log::warn!("llm api key not configured; replies will report a configuration error"),
        }
        if config.whatsapp.token.is_none() {
            log::warn!("whatsapp token not configured; replies cannot be sent");
        }
        if config.whatsapp.phone_number_id.is_none() {
            log::warn!("whatsapp phone number id not configured; replies cannot be sent");
        }
        let completer = CompletionClient::from_config(&config.llm)
            .context("building completion client")?;
        log::info!("completion models (in order): {}", completer.models().join(", "));
        let channel =
            WhatsAppChannel::new(&config.whatsapp).context("building whatsapp client")?;
        Ok(Self::new(config, Arc::new(completer), Arc::new(channel)))
    }
}

/// All routes. Panics inside a handler become the JSON error envelope with status 500.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(webhook::index).post(webhook::deliver))
        .route("/webhook", get(webhook::verify).post(webhook::deliver))
        .route("/health", get(webhook::health))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let reason = agent::panic_message(panic.as_ref());
    log::error!("handler panicked: {}", reason);
    webhook::error_envelope(StatusCode::INTERNAL_SERVER_ERROR, &reason)
}

/// Run the relay; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let verify_token = config::mask_secret(&config.gateway.verify_token);
    let state = GatewayState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {} (verify token {})", bind_addr, verify_token);
    log::info!("routes: GET / | GET /health | GET /webhook (verify) | POST /webhook, POST / (receive)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}
