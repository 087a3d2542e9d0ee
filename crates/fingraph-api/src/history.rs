//! Audit endpoints over a session's graph.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use fingraph_core::graph::{FieldHistoryEntry, TopicAudit};
use fingraph_session::{Agents, SessionRegistry};

use crate::error::ApiError;

fn check_topic<A: Agents>(
  registry: &SessionRegistry<A>,
  topic: &str,
) -> Result<(), ApiError> {
  if !registry.schema().contains(topic) {
    return Err(ApiError::NotFound(format!("topic {topic} not found")));
  }
  Ok(())
}

/// `GET /sessions/:user_id/topics/:topic/history/:field`
pub async fn field<A: Agents>(
  State(registry): State<Arc<SessionRegistry<A>>>,
  Path((user_id, topic, field)): Path<(String, String, String)>,
) -> Result<Json<Vec<FieldHistoryEntry>>, ApiError> {
  check_topic(&registry, &topic)?;
  let history = registry
    .field_history(&user_id, &topic, &field)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("no session for {user_id}")))?;
  Ok(Json(history))
}

/// `GET /sessions/:user_id/topics/:topic`: snapshot, history and conflicts.
pub async fn topic<A: Agents>(
  State(registry): State<Arc<SessionRegistry<A>>>,
  Path((user_id, topic)): Path<(String, String)>,
) -> Result<Json<TopicAudit>, ApiError> {
  check_topic(&registry, &topic)?;
  let session = registry
    .get(&user_id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("no session for {user_id}")))?;
  let audit = session
    .audit(&topic)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("topic {topic} not found")))?;
  Ok(Json(audit))
}
