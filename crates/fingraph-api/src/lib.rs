//! JSON REST API for fingraph sessions.
//!
//! Exposes an axum [`Router`] backed by a [`SessionRegistry`]. Auth, TLS, and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", fingraph_api::api_router(registry.clone()))
//! ```

pub mod error;
pub mod history;
pub mod sessions;


use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{delete, get, post},
};
use fingraph_session::{Agents, SessionRegistry};
use serde_json::{Value, json};

pub use error::ApiError;

/// Build a fully-materialised API router for `registry`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<A: Agents>(registry: Arc<SessionRegistry<A>>) -> Router<()> {
  Router::new()
    .route("/health", get(health))
    // Sessions
    .route("/sessions", get(sessions::list::<A>))
    .route("/sessions/{user_id}", delete(sessions::evict::<A>))
    .route("/sessions/{user_id}/messages", post(sessions::post_message::<A>))
    .route("/sessions/{user_id}/state", get(sessions::state::<A>))
    .route("/sessions/{user_id}/reset", post(sessions::reset::<A>))
    // Audit
    .route(
      "/sessions/{user_id}/topics/{topic}/history/{field}",
      get(history::field::<A>),
    )
    .route("/sessions/{user_id}/topics/{topic}", get(history::topic::<A>))
    .with_state(registry)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
