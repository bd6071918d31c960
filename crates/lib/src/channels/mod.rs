//! Messaging channel: inbound payload normalization and outbound WhatsApp delivery.
//!
//! The gateway normalizes what the platform forwards, and replies through a
//! [`ChannelHandle`] (the WhatsApp Cloud API in production, a stub in tests).

mod inbound;
mod outbound;
mod whatsapp;

pub use inbound::{normalize, normalize_bytes, InboundMessage, NormalizeError};
pub use outbound::{ChannelHandle, OutboundMessage, SendError, SendOutcome};
pub use whatsapp::WhatsAppChannel;
