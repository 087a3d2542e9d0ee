//! Error types for server assembly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("schema error: {0}")]
  Schema(#[from] fingraph_core::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
