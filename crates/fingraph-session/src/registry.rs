//! The set of live sessions, one per user id.

use std::{collections::HashMap, sync::Arc};

use fingraph_core::{graph::FieldHistoryEntry, schema::SchemaRegistry};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
  agent::Agents,
  error::Result,
  orchestrator::SessionOrchestrator,
  view::{SessionStateView, TurnReply},
};

/// Owns every active [`SessionOrchestrator`].
///
/// The map lock is only held to look up or insert a session, never while a
/// session is processing a message, so unrelated users never wait on each
/// other.
pub struct SessionRegistry<A> {
  agents:   Arc<A>,
  schema:   Arc<SchemaRegistry>,
  sessions: Mutex<HashMap<String, Arc<SessionOrchestrator<A>>>>,
}

impl<A: Agents> SessionRegistry<A> {
  pub fn new(agents: Arc<A>, schema: Arc<SchemaRegistry>) -> Self {
    Self {
      agents,
      schema,
      sessions: Mutex::new(HashMap::new()),
    }
  }

  pub fn schema(&self) -> &Arc<SchemaRegistry> { &self.schema }

  /// The session for `user_id`, created if absent. Concurrent callers for the
  /// same user always receive the same session.
  pub async fn get_or_create(
    &self,
    user_id: &str,
  ) -> Arc<SessionOrchestrator<A>> {
    let mut sessions = self.sessions.lock().await;
    if let Some(session) = sessions.get(user_id) {
      return session.clone();
    }
    let session = Arc::new(SessionOrchestrator::new(
      user_id,
      self.agents.clone(),
      self.schema.clone(),
    ));
    sessions.insert(user_id.to_owned(), session.clone());
    info!(user_id, session_id = %session.session_id(), "session created");
    session
  }

  pub async fn get(&self, user_id: &str) -> Option<Arc<SessionOrchestrator<A>>> {
    self.sessions.lock().await.get(user_id).cloned()
  }

  /// Route a message to the user's session, creating it on first contact.
  pub async fn post_user_message(
    &self,
    user_id: &str,
    text: &str,
  ) -> Result<TurnReply> {
    let session = self.get_or_create(user_id).await;
    session.post_user_message(text).await
  }

  /// State of the user's session, or an empty view if there is none.
  pub async fn get_state(&self, user_id: &str) -> SessionStateView {
    match self.get(user_id).await {
      Some(session) => session.state_view().await,
      None => SessionStateView::empty(user_id),
    }
  }

  /// Reset the user's session in place. Returns `false` if there was none.
  pub async fn reset(&self, user_id: &str) -> bool {
    match self.get(user_id).await {
      Some(session) => {
        session.reset().await;
        true
      }
      None => false,
    }
  }

  /// Remove the user's session entirely. Messages in flight or queued for it
  /// are discarded.
  pub async fn evict(&self, user_id: &str) -> bool {
    let removed = self.sessions.lock().await.remove(user_id);
    match removed {
      Some(session) => {
        session.evict().await;
        info!(user_id, "session evicted");
        true
      }
      None => false,
    }
  }

  /// History of one field in the user's session; `None` without a session.
  pub async fn field_history(
    &self,
    user_id: &str,
    topic: &str,
    field: &str,
  ) -> Option<Vec<FieldHistoryEntry>> {
    let session = self.get(user_id).await?;
    Some(session.field_history(topic, field).await)
  }

  /// Every user with a live session, sorted.
  pub async fn user_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> =
      self.sessions.lock().await.keys().cloned().collect();
    ids.sort();
    ids
  }

  pub async fn len(&self) -> usize { self.sessions.lock().await.len() }

  pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}
