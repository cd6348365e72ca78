//! MFAGate Protocol - Authentication types and wire messages
//!
//! This crate defines the core data structures shared by the
//! authentication engine and the signed transport:
//! - `TokenType`/`PushStatus`/`AuthResult`: the per-attempt state model
//! - `PushChallenge`: an outstanding out-of-band approval request
//! - Request/response structs for the backend HTTP API
//! - Username and account-name normalization used everywhere an
//!   identity is compared or sent to the backend

mod identity;
mod result;
mod types;
mod wire;

pub use identity::*;
pub use result::*;
pub use types::*;
pub use wire::*;
