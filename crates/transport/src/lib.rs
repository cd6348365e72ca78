//! MFAGate Transport - Signed HTTP calls to the MFA backend
//!
//! Every outbound request carries a replay-protected HMAC-SHA256
//! signature (`X-Integration-Key`, `X-Signature`, `X-Timestamp`,
//! `X-Nonce`) and every response is decoded into a typed struct.
//! Transport failures and malformed bodies are distinct errors; neither
//! is ever interpreted as authentication success.

mod api;
mod client;

pub use api::*;
pub use client::*;
