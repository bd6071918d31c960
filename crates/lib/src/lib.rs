//! Relay core library: WhatsApp webhook gateway, inbound normalization,
//! LLM completion with model fallback, and outbound WhatsApp delivery.

pub mod agent;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod llm;
