//! Gateway: HTTP surface of the relay.
//!
//! GET /webhook answers the provider's verification handshake; POST /webhook (and
//! POST /) normalizes the forwarded message, asks the LLM for a reply and sends it
//! back over WhatsApp. GET /health and GET / are informational.

mod server;
mod webhook;

pub use server::{router, run_gateway, GatewayState};
pub use webhook::{verification_response, WebhookError};
