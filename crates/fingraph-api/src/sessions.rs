//! Handlers for `/sessions` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/sessions` | Ids of users with a live session |
//! | `POST`   | `/sessions/:user_id/messages` | Body: `{"text":"..."}`; creates the session on first contact |
//! | `GET`    | `/sessions/:user_id/state` | Empty state if no session exists |
//! | `POST`   | `/sessions/:user_id/reset` | `{"reset":false}` if no session exists |
//! | `DELETE` | `/sessions/:user_id` | `{"evicted":false}` if no session exists |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use fingraph_session::{Agents, SessionRegistry, SessionStateView, TurnReply};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;

fn check_user_id(user_id: &str) -> Result<(), ApiError> {
  if user_id.trim().is_empty() {
    return Err(ApiError::BadRequest("user id must not be blank".into()));
  }
  Ok(())
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /sessions`
pub async fn list<A: Agents>(
  State(registry): State<Arc<SessionRegistry<A>>>,
) -> Json<Vec<String>> {
  Json(registry.user_ids().await)
}

// ─── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessageBody {
  #[serde(default)]
  pub text: String,
}

/// `POST /sessions/:user_id/messages`, body: `{"text":"I'm 34"}`
pub async fn post_message<A: Agents>(
  State(registry): State<Arc<SessionRegistry<A>>>,
  Path(user_id): Path<String>,
  Json(body): Json<MessageBody>,
) -> Result<Json<TurnReply>, ApiError> {
  check_user_id(&user_id)?;
  let reply = registry.post_user_message(&user_id, &body.text).await?;
  Ok(Json(reply))
}

// ─── State ────────────────────────────────────────────────────────────────────

/// `GET /sessions/:user_id/state`
pub async fn state<A: Agents>(
  State(registry): State<Arc<SessionRegistry<A>>>,
  Path(user_id): Path<String>,
) -> Json<SessionStateView> {
  Json(registry.get_state(&user_id).await)
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

/// `POST /sessions/:user_id/reset`
pub async fn reset<A: Agents>(
  State(registry): State<Arc<SessionRegistry<A>>>,
  Path(user_id): Path<String>,
) -> Json<Value> {
  Json(json!({ "reset": registry.reset(&user_id).await }))
}

/// `DELETE /sessions/:user_id`
pub async fn evict<A: Agents>(
  State(registry): State<Arc<SessionRegistry<A>>>,
  Path(user_id): Path<String>,
) -> Json<Value> {
  Json(json!({ "evicted": registry.evict(&user_id).await }))
}
