//! Error types for `fingraph-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown topic: {0}")]
  UnknownTopic(String),

  #[error("frontier invariant violated: {0}")]
  InvariantViolation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
