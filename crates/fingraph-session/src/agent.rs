//! Contracts for the external agents a session talks to.
//!
//! Each agent is a trait returning a `Send` future so sessions can be driven
//! from multi-threaded runtimes. Requests are owned and cloneable because a
//! failed call is re-issued verbatim. Every response type implements
//! [`Validate`]; a response that fails validation counts as a failed attempt.

use std::{collections::BTreeMap, future::Future};

use fingraph_core::{
  TopicName,
  graph::{Snapshot, UpdateRecord},
  schema::TopicSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// Structural checks applied to every agent response before it is used.
pub trait Validate {
  fn validate(&self) -> Result<(), AgentError>;
}

// ─── Interview agent ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
  pub topic:  TopicName,
  pub schema: TopicSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
  pub question:       String,
  #[serde(default)]
  pub topic_complete: bool,
}

impl Validate for StartResponse {
  fn validate(&self) -> Result<(), AgentError> {
    if self.question.trim().is_empty() && !self.topic_complete {
      return Err(AgentError::Schema(
        "start returned no question for an incomplete topic".into(),
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondRequest {
  pub topic:     TopicName,
  pub schema:    TopicSchema,
  pub snapshot:  Snapshot,
  pub user_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RespondResponse {
  /// `None` when the agent has nothing further to ask about the topic.
  #[serde(default)]
  pub question:         Option<String>,
  #[serde(default)]
  pub topic_complete:   bool,
  /// Field values for the current topic noticed while phrasing the question.
  #[serde(default)]
  pub extracted_fields: Map<String, Value>,
}

impl Validate for RespondResponse {
  fn validate(&self) -> Result<(), AgentError> {
    if self.extracted_fields.keys().any(|k| k.trim().is_empty()) {
      return Err(AgentError::Schema("extracted field with empty name".into()));
    }
    Ok(())
  }
}

/// Asks the user questions about one topic at a time.
pub trait InterviewAgent: Send + Sync {
  /// Open a topic.
  fn start(
    &self,
    request: StartRequest,
  ) -> impl Future<Output = Result<StartResponse, AgentError>> + Send + '_;

  /// Produce the next question for a topic after a user reply.
  fn respond(
    &self,
    request: RespondRequest,
  ) -> impl Future<Output = Result<RespondResponse, AgentError>> + Send + '_;
}

// ─── Extraction agent ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
  pub user_text:        String,
  pub current_topic:    Option<TopicName>,
  pub current_question: Option<String>,
  pub snapshots:        BTreeMap<TopicName, Snapshot>,
  pub schemas:          Vec<TopicSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
  #[serde(default)]
  pub updates:                           Vec<UpdateRecord>,
  pub answer_consumed_for_current_topic: bool,
  #[serde(default)]
  pub priority_shift:                    Option<Vec<TopicName>>,
  #[serde(default)]
  pub conflicts_detected:                bool,
  #[serde(default)]
  pub reasoning:                         String,
}

impl Validate for ExtractionResponse {
  fn validate(&self) -> Result<(), AgentError> {
    for update in &self.updates {
      if update.topic.as_str().trim().is_empty()
        || update.field.trim().is_empty()
      {
        return Err(AgentError::Schema("update with empty topic or field".into()));
      }
      if !(0.0..=1.0).contains(&update.confidence) {
        return Err(AgentError::Schema(format!(
          "confidence {} for {}.{} is outside 0..=1",
          update.confidence, update.topic, update.field
        )));
      }
    }
    let mut shift = self.priority_shift.iter().flatten();
    if shift.any(|t| t.as_str().trim().is_empty()) {
      return Err(AgentError::Schema("empty topic in priority shift".into()));
    }
    Ok(())
  }
}

/// Turns free-text replies into structured field updates.
pub trait ExtractionAgent: Send + Sync {
  fn resolve(
    &self,
    request: ResolveRequest,
  ) -> impl Future<Output = Result<ExtractionResponse, AgentError>> + Send + '_;
}

// ─── Ranking agent ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankRequest {
  pub visited:          Vec<TopicName>,
  pub pending:          Vec<TopicName>,
  /// Registry topics that are neither visited, pending, nor dismissed.
  pub available_topics: Vec<TopicName>,
  pub snapshots:        BTreeMap<TopicName, Snapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingResponse {
  #[serde(default)]
  pub ranked_topics:         Vec<TopicName>,
  #[serde(default)]
  pub all_coverage_complete: bool,
  #[serde(default)]
  pub reasoning:             String,
  /// Topics the agent judged irrelevant for this user.
  #[serde(default)]
  pub dismissed_topics:      Vec<TopicName>,
}

impl Validate for RankingResponse {
  fn validate(&self) -> Result<(), AgentError> {
    let mut names = self.ranked_topics.iter().chain(&self.dismissed_topics);
    if names.any(|t| t.as_str().trim().is_empty()) {
      return Err(AgentError::Schema("empty topic name in ranking".into()));
    }
    Ok(())
  }
}

/// Orders the topics still to be covered.
pub trait RankingAgent: Send + Sync {
  fn rank(
    &self,
    request: RankRequest,
  ) -> impl Future<Output = Result<RankingResponse, AgentError>> + Send + '_;
}

// ─── Bundle ──────────────────────────────────────────────────────────────────

/// Everything a session needs from the outside world.
pub trait Agents:
  InterviewAgent + ExtractionAgent + RankingAgent + Send + Sync + 'static
{
}

impl<T> Agents for T where
  T: InterviewAgent + ExtractionAgent + RankingAgent + Send + Sync + 'static
{
}
