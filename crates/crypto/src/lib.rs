//! MFAGate Crypto - Request signing and secret-at-rest handling
//!
//! This crate provides:
//! - HMAC-SHA256 request signatures over `timestamp ++ nonce ++ body`
//! - Random 128-bit nonces for replay protection
//! - The secret-store policy: encrypted credentials at rest with a
//!   plaintext-migration fallback, zeroing decrypted material as soon
//!   as it leaves scope

mod signing;
mod store;

pub use signing::*;
pub use store::*;
