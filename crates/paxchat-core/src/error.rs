use thiserror::Error;

use crate::validation::ValidationError;

/// Error type shared by the wire-level building blocks in this crate.
///
/// Node- and relay-specific errors (transport, store, consensus) live in
/// `paxchat` alongside the code that produces them; this enum only covers
/// failures that can occur while constructing or validating the types
/// `paxchat-core` defines.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
