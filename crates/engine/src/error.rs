//! Engine error taxonomy

use thiserror::Error;

use crate::ConfigError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The attempt was cancelled (user dismissed the prompt or a new
    /// attempt superseded it). Deliberately not an `AuthResult`: a
    /// cancelled attempt has no terminal outcome.
    #[error("Attempt cancelled")]
    Cancelled,

    /// The attempt cannot proceed at all (missing keys, bad endpoint)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
