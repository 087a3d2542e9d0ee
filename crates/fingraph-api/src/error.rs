//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Shown to the user when an agent could not be reached or understood.
pub const RETRY_MESSAGE: &str = "Sorry, I didn't quite catch that. Could you \
                                 rephrase or send it again?";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("session error: {0}")]
  Session(#[from] fingraph_session::Error),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use fingraph_session::Error as SessionError;

    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Session(SessionError::InteractionRetryExhausted { .. }) => {
        tracing::warn!(error = %self, "turn abandoned");
        return (
          StatusCode::SERVICE_UNAVAILABLE,
          Json(json!({ "error": self.to_string(), "message": RETRY_MESSAGE })),
        )
          .into_response();
      }
      ApiError::Session(SessionError::SessionReset) => {
        (StatusCode::CONFLICT, self.to_string())
      }
      ApiError::Session(SessionError::Core(e)) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
