//! Error types for `fingraph-session`.

use thiserror::Error;

/// A single failed attempt at an external agent call.
///
/// Always transient from the session's point of view: the call is retried.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
  #[error("agent transport failed: {0}")]
  Transport(String),

  #[error("agent response could not be parsed: {0}")]
  Parse(String),

  #[error("agent response failed validation: {0}")]
  Schema(String),
}

#[derive(Debug, Error)]
pub enum Error {
  /// Every attempt at an agent call failed. The session is unchanged and the
  /// same message can be sent again.
  #[error("{call} failed after {attempts} attempts: {last}")]
  InteractionRetryExhausted {
    call:     &'static str,
    attempts: u32,
    #[source]
    last:     AgentError,
  },

  /// The session was reset or evicted while this turn was in flight; its
  /// results were discarded.
  #[error("session was reset while the message was being processed")]
  SessionReset,

  #[error(transparent)]
  Core(#[from] fingraph_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
