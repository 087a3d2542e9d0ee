//! Interview state machine labels.

use fingraph_core::TopicName;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where the interview is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InterviewState {
  AwaitingFirstContact,
  InterviewingTopic { topic: TopicName },
  /// The frontier must be re-ranked before the next question; `trigger` are
  /// the topics that must end up at its head.
  ReplanningRequired { trigger: Vec<TopicName> },
  /// Terminal for the interview. Later messages go to analysis.
  Completed,
}

impl InterviewState {
  pub fn current_topic(&self) -> Option<&TopicName> {
    match self {
      Self::InterviewingTopic { topic } => Some(topic),
      _ => None,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::AwaitingFirstContact => "awaiting_first_contact",
      Self::InterviewingTopic { .. } => "interviewing_topic",
      Self::ReplanningRequired { .. } => "replanning_required",
      Self::Completed => "completed",
    }
  }
}

/// Coarse progress of a session. Only ever moves forward.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
  #[default]
  Discovery,
  DataGathering,
  DeepAnalysis,
}

impl Phase {
  /// Move to `next` unless the session is already past it.
  pub fn advance_to(&mut self, next: Phase) {
    if next > *self {
      *self = next;
    }
  }
}
