//! The per-user interview state machine.
//!
//! A turn works on a private copy of the session's graph and frontier and
//! commits it only if every agent call succeeded and the session was not
//! reset meanwhile. Agent calls therefore never run under the state lock, and
//! a failed turn leaves the session exactly as it was.

use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use fingraph_core::{
  TopicName,
  frontier::Frontier,
  graph::{
    ApplyOutcome, Conflict, FieldHistoryEntry, GraphStore, TopicAudit,
    UpdateRecord, UpdateSource,
  },
  schema::{SchemaRegistry, TopicSchema},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  agent::{Agents, RankRequest, ResolveRequest, RespondRequest, StartRequest},
  error::{Error, Result},
  retry::with_retry,
  state::{InterviewState, Phase},
  view::{ReplyMode, SessionStateView, TopicStatus, TurnReply},
};

/// How many queued topics a reply previews.
const UPCOMING_LEN: usize = 5;

#[derive(Debug, Clone)]
struct SessionCore {
  graph:         GraphStore,
  frontier:      Frontier,
  state:         InterviewState,
  phase:         Phase,
  turn_count:    u64,
  last_question: Option<String>,
}

impl SessionCore {
  fn new(registry: Arc<SchemaRegistry>) -> Self {
    Self {
      graph:         GraphStore::new(registry),
      frontier:      Frontier::new(),
      state:         InterviewState::AwaitingFirstContact,
      phase:         Phase::default(),
      turn_count:    0,
      last_question: None,
    }
  }
}

/// One user's interview.
pub struct SessionOrchestrator<A> {
  user_id:    String,
  session_id: Uuid,
  created_at: DateTime<Utc>,
  agents:     Arc<A>,
  registry:   Arc<SchemaRegistry>,
  /// Held for the whole of a turn, so messages are processed one at a time
  /// in arrival order.
  turn:       Mutex<()>,
  core:       RwLock<SessionCore>,
  /// Bumped on reset; a turn whose generation is stale is discarded.
  generation: AtomicU64,
  /// Set once the registry drops this session. No turn commits afterwards.
  evicted:    AtomicBool,
}

impl<A: Agents> SessionOrchestrator<A> {
  pub fn new(
    user_id: impl Into<String>,
    agents: Arc<A>,
    registry: Arc<SchemaRegistry>,
  ) -> Self {
    Self {
      user_id: user_id.into(),
      session_id: Uuid::new_v4(),
      created_at: Utc::now(),
      agents,
      core: RwLock::new(SessionCore::new(registry.clone())),
      registry,
      turn: Mutex::new(()),
      generation: AtomicU64::new(0),
      evicted: AtomicBool::new(false),
    }
  }

  pub fn user_id(&self) -> &str { &self.user_id }

  pub fn session_id(&self) -> Uuid { self.session_id }

  pub fn generation(&self) -> u64 { self.generation.load(Ordering::SeqCst) }

  pub fn is_evicted(&self) -> bool { self.evicted.load(Ordering::SeqCst) }

  // ─── Turns ─────────────────────────────────────────────────────────────────

  /// Process one user message and return what to say next.
  ///
  /// On [`Error::InteractionRetryExhausted`] nothing about the session has
  /// changed and the same message may simply be sent again.
  pub async fn post_user_message(&self, text: &str) -> Result<TurnReply> {
    let _turn = self.turn.lock().await;
    if self.is_evicted() {
      return Err(Error::SessionReset);
    }
    let (mut core, generation) = {
      let core = self.core.read().await;
      (core.clone(), self.generation())
    };

    let mut conflicts = Vec::new();
    self.process(&mut core, text, generation, &mut conflicts).await?;
    core.turn_count += 1;

    if let Err(e) = core.frontier.check_invariants() {
      error!(user_id = %self.user_id, error = %e, "repairing frontier");
      core.frontier.repair();
      core.state = InterviewState::ReplanningRequired {
        trigger: Vec::new(),
      };
    }

    let reply = reply_for(&core, conflicts);
    self.commit(core, generation).await?;
    Ok(reply)
  }

  async fn process(
    &self,
    core: &mut SessionCore,
    text: &str,
    generation: u64,
    conflicts: &mut Vec<Conflict>,
  ) -> Result<()> {
    match core.state.clone() {
      InterviewState::Completed => Ok(()),
      InterviewState::AwaitingFirstContact => {
        info!(user_id = %self.user_id, session_id = %self.session_id, "session started");
        core.frontier.seed(self.registry.seed_order());
        self
          .open_next(core, generation, None, "session start".into(), false)
          .await?;
        // Anything said on first contact is treated as the opening answer.
        match core.state.current_topic().cloned() {
          Some(topic) if !text.trim().is_empty() => {
            self
              .handle_reply(core, topic, text, generation, conflicts)
              .await
          }
          _ => Ok(()),
        }
      }
      InterviewState::InterviewingTopic { topic } => {
        self
          .handle_reply(core, topic, text, generation, conflicts)
          .await
      }
      InterviewState::ReplanningRequired { mut trigger } => {
        if !text.trim().is_empty() {
          let (_, extra) =
            self.extract(core, None, text, generation, conflicts).await?;
          union_into(&mut trigger, extra);
        }
        self.replan(core, generation, &trigger).await?;
        self
          .open_next(core, generation, None, shift_reason(&trigger), true)
          .await
      }
    }
  }

  async fn handle_reply(
    &self,
    core: &mut SessionCore,
    topic: TopicName,
    text: &str,
    generation: u64,
    conflicts: &mut Vec<Conflict>,
  ) -> Result<()> {
    core.phase.advance_to(Phase::DataGathering);
    let (consumed, trigger) = self
      .extract(core, Some(&topic), text, generation, conflicts)
      .await?;

    let replanned = !trigger.is_empty();
    if replanned {
      core.state = InterviewState::ReplanningRequired {
        trigger: trigger.clone(),
      };
      self.replan(core, generation, &trigger).await?;
      core.state = InterviewState::InterviewingTopic {
        topic: topic.clone(),
      };
    }

    // An unanswered question keeps the topic open; a reordered frontier only
    // takes effect once the user has answered.
    if consumed && core.frontier.is_visited(&topic) {
      return self
        .open_next(core, generation, Some(topic), "topic complete".into(), false)
        .await;
    }
    let head = core.frontier.select_next().cloned();
    if consumed && head.as_ref() != Some(&topic) {
      let reason = match head {
        Some(next) if !replanned => format!("priority shift: {next}"),
        _ => shift_reason(&trigger),
      };
      return self
        .open_next(core, generation, Some(topic), reason, replanned)
        .await;
    }

    let request = RespondRequest {
      topic:     topic.clone(),
      schema:    self.schema_for(&topic)?,
      snapshot:  core
        .graph
        .get_snapshot(topic.as_str())
        .cloned()
        .unwrap_or_default(),
      user_text: text.to_owned(),
    };
    let response = with_retry("interview.respond", || {
      self.agents.respond(request.clone())
    })
    .await?;
    self.ensure_current(generation)?;

    let updates = response
      .extracted_fields
      .into_iter()
      .map(|(field, value)| UpdateRecord::new(topic.clone(), field, value))
      .collect();
    let outcome = core.graph.apply_updates(updates, UpdateSource::Interview);
    self.log_rejected(&outcome);
    core.frontier.force_priority(&outcome.priority_topics());
    conflicts.extend(outcome.conflicts);
    core.frontier.sync_completion(&core.graph);

    let done = response.topic_complete
      || response.question.is_none()
      || core.frontier.is_visited(&topic);
    if consumed && done {
      core.frontier.mark_visited(&topic);
      return self
        .open_next(core, generation, Some(topic), "topic complete".into(), false)
        .await;
    }
    if let Some(question) = response.question {
      core.last_question = Some(question);
    }
    Ok(())
  }

  /// Run the extraction agent over `text` and apply what it found.
  ///
  /// Returns whether the reply answered the current question, and the topics
  /// that must be prioritised as a result.
  async fn extract(
    &self,
    core: &mut SessionCore,
    current: Option<&TopicName>,
    text: &str,
    generation: u64,
    conflicts: &mut Vec<Conflict>,
  ) -> Result<(bool, Vec<TopicName>)> {
    let request = ResolveRequest {
      user_text:        text.to_owned(),
      current_topic:    current.cloned(),
      current_question: core.last_question.clone(),
      snapshots:        core.graph.all_snapshots().clone(),
      schemas:          self.registry.topics().to_vec(),
    };
    let response = with_retry("extraction.resolve", || {
      self.agents.resolve(request.clone())
    })
    .await?;
    self.ensure_current(generation)?;

    let outcome = core
      .graph
      .apply_updates(response.updates, UpdateSource::Extraction);
    self.log_rejected(&outcome);

    let mut trigger = outcome.priority_topics();
    let shift = response.priority_shift.unwrap_or_default();
    union_into(&mut trigger, self.known_topics("extraction", shift));
    conflicts.extend(outcome.conflicts);

    let completed = core.frontier.sync_completion(&core.graph);
    if !completed.is_empty() {
      info!(user_id = %self.user_id, ?completed, "topics completed by extraction");
    }
    Ok((response.answer_consumed_for_current_topic, trigger))
  }

  /// Ask the ranking agent to reorder the frontier, then put `trigger` at
  /// its head.
  async fn replan(
    &self,
    core: &mut SessionCore,
    generation: u64,
    trigger: &[TopicName],
  ) -> Result<()> {
    let request = RankRequest {
      visited:          core.frontier.visited().iter().cloned().collect(),
      pending:          core.frontier.pending().to_vec(),
      available_topics: self.unconsidered(&core.frontier),
      snapshots:        core.graph.all_snapshots().clone(),
    };
    let response =
      with_retry("ranking.rank", || self.agents.rank(request.clone())).await?;
    self.ensure_current(generation)?;

    let ranked = self.known_topics("ranking", response.ranked_topics);
    let dismissed = self.known_topics("ranking", response.dismissed_topics);
    core.frontier.dismiss(&dismissed);
    core.frontier.merge_ranked(&ranked);
    if core.frontier.pending().is_empty() && !response.all_coverage_complete {
      let fallback = self.unconsidered(&core.frontier);
      core.frontier.seed(&fallback);
    }
    core.frontier.force_priority(trigger);
    core.frontier.sync_completion(&core.graph);

    if let Err(e) = core.frontier.check_invariants() {
      error!(user_id = %self.user_id, error = %e, "repairing frontier");
      core.frontier.repair();
    }
    info!(
      user_id = %self.user_id,
      upcoming = ?core.frontier.upcoming(UPCOMING_LEN),
      "frontier replanned"
    );
    Ok(())
  }

  /// Open the scheduler's next topic, replanning once if the frontier is
  /// empty. Completes the interview when nothing is left after replanning.
  async fn open_next(
    &self,
    core: &mut SessionCore,
    generation: u64,
    mut from: Option<TopicName>,
    mut reason: String,
    mut replanned: bool,
  ) -> Result<()> {
    loop {
      let Some(next) = core.frontier.select_next().cloned() else {
        if replanned {
          info!(user_id = %self.user_id, "interview complete");
          core.state = InterviewState::Completed;
          core.phase.advance_to(Phase::DeepAnalysis);
          core.last_question = None;
          return Ok(());
        }
        core.state = InterviewState::ReplanningRequired {
          trigger: Vec::new(),
        };
        self.replan(core, generation, &[]).await?;
        replanned = true;
        reason = "replanned".into();
        continue;
      };

      let request = StartRequest {
        topic:  next.clone(),
        schema: self.schema_for(&next)?,
      };
      let response =
        with_retry("interview.start", || self.agents.start(request.clone()))
          .await?;
      self.ensure_current(generation)?;

      info!(user_id = %self.user_id, ?from, to = %next, %reason, "topic transition");
      core.graph.record_edge(from, next.clone(), reason);

      if response.topic_complete {
        core.frontier.mark_visited(&next);
        from = Some(next);
        reason = "topic complete".into();
        continue;
      }
      core.state = InterviewState::InterviewingTopic { topic: next };
      core.last_question = Some(response.question);
      return Ok(());
    }
  }

  async fn commit(&self, core: SessionCore, generation: u64) -> Result<()> {
    let mut current = self.core.write().await;
    if !self.is_current(generation) {
      warn!(user_id = %self.user_id, "discarding turn for reset session");
      return Err(Error::SessionReset);
    }
    *current = core;
    Ok(())
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  fn is_current(&self, generation: u64) -> bool {
    !self.is_evicted() && self.generation() == generation
  }

  fn ensure_current(&self, generation: u64) -> Result<()> {
    if self.is_current(generation) {
      Ok(())
    } else {
      Err(Error::SessionReset)
    }
  }

  fn schema_for(&self, topic: &TopicName) -> Result<TopicSchema> {
    self
      .registry
      .get(topic.as_str())
      .cloned()
      .ok_or_else(|| fingraph_core::Error::UnknownTopic(topic.to_string()).into())
  }

  /// Drop (and log) topic names the registry does not declare.
  fn known_topics(
    &self,
    source: &'static str,
    topics: Vec<TopicName>,
  ) -> Vec<TopicName> {
    let mut known = Vec::with_capacity(topics.len());
    for topic in topics {
      if self.registry.contains(topic.as_str()) {
        known.push(topic);
      } else {
        warn!(user_id = %self.user_id, source, %topic, "dropping unknown topic");
      }
    }
    known
  }

  fn log_rejected(&self, outcome: &ApplyOutcome) {
    for rejected in &outcome.rejected {
      warn!(
        user_id = %self.user_id,
        topic = %rejected.update.topic,
        field = %rejected.update.field,
        "dropping update for unknown topic"
      );
    }
  }

  /// Registry topics not yet visited, queued, or dismissed: seed order first,
  /// then declaration order.
  fn unconsidered(&self, frontier: &Frontier) -> Vec<TopicName> {
    let mut out: Vec<TopicName> = Vec::new();
    for topic in self
      .registry
      .seed_order()
      .iter()
      .chain(self.registry.topic_names())
    {
      let considered = frontier.is_visited(topic)
        || frontier.is_pending(topic)
        || frontier.dismissed().contains(topic);
      if !considered && !out.contains(topic) {
        out.push(topic.clone());
      }
    }
    out
  }

  // ─── Administration ────────────────────────────────────────────────────────

  /// Discard all session state. A turn in flight will fail with
  /// [`Error::SessionReset`] instead of committing.
  pub async fn reset(&self) {
    let mut core = self.core.write().await;
    *core = SessionCore::new(self.registry.clone());
    self.generation.fetch_add(1, Ordering::SeqCst);
    info!(user_id = %self.user_id, "session reset");
  }

  /// Reset the session and refuse every turn queued or in flight for it.
  pub async fn evict(&self) {
    self.evicted.store(true, Ordering::SeqCst);
    self.reset().await;
  }

  // ─── Reads ─────────────────────────────────────────────────────────────────

  pub async fn state_view(&self) -> SessionStateView {
    let core = self.core.read().await;
    let topics = self
      .registry
      .topic_names()
      .map(|name| {
        let topic = name.as_str();
        let status = TopicStatus {
          complete:       core.graph.is_complete(topic),
          missing_fields: core.graph.missing_fields(topic),
          has_conflicts:  core.graph.has_conflicts(topic),
          snapshot:       core
            .graph
            .get_snapshot(topic)
            .cloned()
            .unwrap_or_default(),
        };
        (name.clone(), status)
      })
      .collect();

    SessionStateView {
      user_id: self.user_id.clone(),
      session_id: Some(self.session_id),
      created_at: Some(self.created_at),
      phase: core.phase,
      current_topic: core.state.current_topic().cloned(),
      state: core.state.clone(),
      turn_count: core.turn_count,
      visited: core.frontier.visited().iter().cloned().collect(),
      pending: core.frontier.pending().to_vec(),
      dismissed: core.frontier.dismissed().iter().cloned().collect(),
      topics,
      last_question: core.last_question.clone(),
    }
  }

  pub async fn field_history(
    &self,
    topic: &str,
    field: &str,
  ) -> Vec<FieldHistoryEntry> {
    let core = self.core.read().await;
    core.graph.get_field_history(topic, field).to_vec()
  }

  pub async fn audit(&self, topic: &str) -> Option<TopicAudit> {
    self.core.read().await.graph.node_with_history(topic)
  }
}

fn reply_for(core: &SessionCore, conflicts: Vec<Conflict>) -> TurnReply {
  let complete = core.state == InterviewState::Completed;
  TurnReply {
    mode: if complete {
      ReplyMode::Analysis
    } else {
      ReplyMode::Interview
    },
    question: core.last_question.clone(),
    topic: core.state.current_topic().cloned(),
    phase: core.phase,
    complete,
    conflicts,
    upcoming: core.frontier.upcoming(UPCOMING_LEN).to_vec(),
  }
}

fn shift_reason(trigger: &[TopicName]) -> String {
  if trigger.is_empty() {
    return "replanned".into();
  }
  let names: Vec<&str> = trigger.iter().map(TopicName::as_str).collect();
  format!("priority shift: {}", names.join(", "))
}

fn union_into(into: &mut Vec<TopicName>, extra: Vec<TopicName>) {
  for topic in extra {
    if !into.contains(&topic) {
      into.push(topic);
    }
  }
}
