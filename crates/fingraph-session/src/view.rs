//! Serialisable views handed to the transport layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fingraph_core::{
  TopicName,
  graph::{Conflict, Snapshot},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{InterviewState, Phase};

/// Whether a reply came from the interview or from post-interview analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
  Interview,
  Analysis,
}

/// The result of one user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
  pub mode:      ReplyMode,
  /// Next question to put to the user; `None` once the interview is over.
  pub question:  Option<String>,
  pub topic:     Option<TopicName>,
  pub phase:     Phase,
  /// The interview has covered everything it is going to.
  pub complete:  bool,
  /// Contradictions detected while processing this message.
  pub conflicts: Vec<Conflict>,
  pub upcoming:  Vec<TopicName>,
}

/// Per-topic summary within a [`SessionStateView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicStatus {
  pub complete:       bool,
  pub missing_fields: Vec<String>,
  pub has_conflicts:  bool,
  pub snapshot:       Snapshot,
}

/// Everything needed to reason about a session without replaying its
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStateView {
  pub user_id:       String,
  /// `None` when no session exists for the user.
  pub session_id:    Option<Uuid>,
  pub created_at:    Option<DateTime<Utc>>,
  pub phase:         Phase,
  pub state:         InterviewState,
  pub current_topic: Option<TopicName>,
  pub turn_count:    u64,
  pub visited:       Vec<TopicName>,
  /// Head first.
  pub pending:       Vec<TopicName>,
  pub dismissed:     Vec<TopicName>,
  pub topics:        BTreeMap<TopicName, TopicStatus>,
  pub last_question: Option<String>,
}

impl SessionStateView {
  /// The view reported for a user with no session.
  pub fn empty(user_id: impl Into<String>) -> Self {
    Self {
      user_id:       user_id.into(),
      session_id:    None,
      created_at:    None,
      phase:         Phase::default(),
      state:         InterviewState::AwaitingFirstContact,
      current_topic: None,
      turn_count:    0,
      visited:       Vec::new(),
      pending:       Vec::new(),
      dismissed:     Vec::new(),
      topics:        BTreeMap::new(),
      last_question: None,
    }
  }
}
