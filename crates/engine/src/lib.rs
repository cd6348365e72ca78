//! MFAGate Engine - The per-login authentication state machine
//!
//! This crate decides which second factor to request and drives it to
//! a terminal outcome:
//! - bypass policy (excluded break-glass accounts, required groups,
//!   "recently authenticated" grace window)
//! - capability discovery and single-step vs. two-step flow selection
//! - OTP validation and push orchestration with a cancellable
//!   background poller
//! - host return-code mapping (PAM codes, credential-provider states)
//!
//! Everything that touches the OS or the network sits behind a
//! collaborator trait so the full state machine runs in tests against
//! scripted data.

mod attempt;
mod audit;
mod config;
mod continuity;
mod engine;
mod error;
pub mod host;
mod policy;
mod poller;

pub use attempt::*;
pub use audit::*;
pub use config::*;
pub use continuity::*;
pub use engine::*;
pub use error::*;
pub use policy::*;
pub use poller::*;
