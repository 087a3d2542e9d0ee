//! The per-session knowledge graph: snapshots, field history, conflicts, and
//! scheduler edges.
//!
//! Snapshots are only ever written through [`GraphStore::apply_updates`] (or
//! the history-free [`GraphStore::upsert_snapshot`]). History is append-only:
//! a correction is a new entry that remembers the value it replaced, never a
//! rewrite of an old one.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::{
  Error, Result,
  classifier::{ConflictCategory, classify},
  schema::{FieldSemantics, SchemaRegistry},
  topic::TopicName,
  value::{merge, values_equal},
};

/// Current value of every known field of one topic.
pub type Snapshot = BTreeMap<String, Value>;

// ─── Update input ────────────────────────────────────────────────────────────

/// Whether a stated fact applies to the past, present, or future.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemporalContext {
  Past,
  #[default]
  Present,
  Future,
}

/// Who produced an update.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateSource {
  /// The fact-extraction agent.
  Extraction,
  /// Fields the interview agent picked up while phrasing its next question.
  Interview,
  /// Written by an operator through the API.
  Operator,
}

fn default_confidence() -> f64 { 1.0 }

/// A single proposed field write, as produced by the extraction agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
  pub topic:            TopicName,
  pub field:            String,
  pub value:            Value,
  /// `0.0..=1.0`.
  #[serde(default = "default_confidence")]
  pub confidence:       f64,
  #[serde(default)]
  pub temporal_context: TemporalContext,
  #[serde(default)]
  pub is_correction:    bool,
  #[serde(default)]
  pub reasoning:        Option<String>,
}

impl UpdateRecord {
  /// A present-tense, full-confidence update with no reasoning attached.
  pub fn new(
    topic: impl Into<TopicName>,
    field: impl Into<String>,
    value: Value,
  ) -> Self {
    Self {
      topic: topic.into(),
      field: field.into(),
      value,
      confidence: default_confidence(),
      temporal_context: TemporalContext::default(),
      is_correction: false,
      reasoning: None,
    }
  }

  pub fn with_temporal_context(mut self, context: TemporalContext) -> Self {
    self.temporal_context = context;
    self
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One immutable entry in a field's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldHistoryEntry {
  /// Store-wide sequence number; totally orders all history.
  pub seq:              u64,
  pub topic:            TopicName,
  pub field:            String,
  pub value:            Value,
  /// Never earlier than the previous entry's timestamp.
  pub recorded_at:      DateTime<Utc>,
  pub source:           UpdateSource,
  pub previous_value:   Option<Value>,
  pub temporal_context: TemporalContext,
  /// A future-dated claim that was not applied to the snapshot.
  pub is_projection:    bool,
  pub is_correction:    bool,
  pub confidence:       f64,
  /// Set when this write contradicted an existing value.
  pub category:         Option<ConflictCategory>,
  pub reasoning:        Option<String>,
}

/// A recorded contradiction of an existing non-null value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
  pub topic:            TopicName,
  pub field:            String,
  pub old_value:        Value,
  pub new_value:        Value,
  pub category:         ConflictCategory,
  pub suggested_topics: Vec<TopicName>,
  pub detected_at:      DateTime<Utc>,
  pub reasoning:        Option<String>,
}

/// A scheduler decision: the interview moved from one topic to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
  /// `None` for the opening topic of a session.
  pub from_topic: Option<TopicName>,
  pub to_topic:   TopicName,
  pub reason:     String,
  pub timestamp:  DateTime<Utc>,
}

// ─── Apply outcome ───────────────────────────────────────────────────────────

/// A classification that asks for topics to be prioritised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityTrigger {
  pub topic:            TopicName,
  pub field:            String,
  pub category:         ConflictCategory,
  pub suggested_topics: Vec<TopicName>,
  /// The field was written for the first time; nothing was contradicted.
  pub discovery:        bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
  UnknownTopic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedUpdate {
  pub update: UpdateRecord,
  pub reason: RejectReason,
}

/// What a call to [`GraphStore::apply_updates`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
  pub conflicts:   Vec<Conflict>,
  pub triggers:    Vec<PriorityTrigger>,
  /// Updates dropped before any mutation.
  pub rejected:    Vec<RejectedUpdate>,
  /// Topics whose snapshot changed, in first-touched order.
  pub touched:     Vec<TopicName>,
  /// Future-dated updates recorded in history only.
  pub projections: usize,
}

impl ApplyOutcome {
  /// Union of every trigger's suggested topics, first mention first.
  pub fn priority_topics(&self) -> Vec<TopicName> {
    let mut out: Vec<TopicName> = Vec::new();
    for topic in self.triggers.iter().flat_map(|t| &t.suggested_topics) {
      if !out.contains(topic) {
        out.push(topic.clone());
      }
    }
    out
  }

  pub fn is_priority_shift(&self) -> bool {
    self.triggers.iter().any(|t| !t.suggested_topics.is_empty())
  }
}

// ─── Audit view ──────────────────────────────────────────────────────────────

/// A topic's snapshot together with everything that led to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAudit {
  pub topic:     TopicName,
  pub snapshot:  Snapshot,
  pub history:   BTreeMap<String, Vec<FieldHistoryEntry>>,
  pub conflicts: Vec<Conflict>,
}

/// Serialisable form of a [`GraphStore`], minus the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
  pub snapshots:       BTreeMap<TopicName, Snapshot>,
  pub history:         BTreeMap<TopicName, BTreeMap<String, Vec<FieldHistoryEntry>>>,
  pub conflicts:       Vec<Conflict>,
  pub edges:           Vec<Edge>,
  pub traversal_order: Vec<TopicName>,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Snapshots, history, conflicts, and edges for one session.
#[derive(Debug, Clone)]
pub struct GraphStore {
  registry:        Arc<SchemaRegistry>,
  snapshots:       BTreeMap<TopicName, Snapshot>,
  history:         BTreeMap<TopicName, BTreeMap<String, Vec<FieldHistoryEntry>>>,
  conflicts:       Vec<Conflict>,
  edges:           Vec<Edge>,
  traversal_order: Vec<TopicName>,
  next_seq:        u64,
  last_at:         Option<DateTime<Utc>>,
}

impl GraphStore {
  pub fn new(registry: Arc<SchemaRegistry>) -> Self {
    Self {
      registry,
      snapshots: BTreeMap::new(),
      history: BTreeMap::new(),
      conflicts: Vec::new(),
      edges: Vec::new(),
      traversal_order: Vec::new(),
      next_seq: 0,
      last_at: None,
    }
  }

  /// Rebuild a store from its serialised form.
  ///
  /// Fails with [`Error::UnknownTopic`] if the record references a topic the
  /// registry does not declare.
  pub fn from_record(
    registry: Arc<SchemaRegistry>,
    record: GraphRecord,
  ) -> Result<Self> {
    let unknown = record
      .snapshots
      .keys()
      .chain(record.history.keys())
      .chain(record.traversal_order.iter())
      .find(|t| !registry.contains(t.as_str()));
    if let Some(topic) = unknown {
      return Err(Error::UnknownTopic(topic.to_string()));
    }

    let entries = || record.history.values().flat_map(|f| f.values()).flatten();
    let next_seq = entries().map(|e| e.seq + 1).max().unwrap_or(0);
    let last_at = entries().map(|e| e.recorded_at).max();

    Ok(Self {
      registry,
      snapshots: record.snapshots,
      history: record.history,
      conflicts: record.conflicts,
      edges: record.edges,
      traversal_order: record.traversal_order,
      next_seq,
      last_at,
    })
  }

  pub fn to_record(&self) -> GraphRecord {
    GraphRecord {
      snapshots:       self.snapshots.clone(),
      history:         self.history.clone(),
      conflicts:       self.conflicts.clone(),
      edges:           self.edges.clone(),
      traversal_order: self.traversal_order.clone(),
    }
  }

  pub fn registry(&self) -> &Arc<SchemaRegistry> { &self.registry }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Merge `fields` into the topic's snapshot, creating it if absent.
  /// History is not touched.
  pub fn upsert_snapshot(
    &mut self,
    topic: &TopicName,
    fields: impl IntoIterator<Item = (String, Value)>,
  ) -> Result<()> {
    if !self.registry.contains(topic.as_str()) {
      return Err(Error::UnknownTopic(topic.to_string()));
    }
    self.materialise(topic).extend(fields);
    Ok(())
  }

  /// Apply a batch of proposed field writes.
  ///
  /// Updates naming a topic the registry does not know are dropped before
  /// anything is mutated and reported in [`ApplyOutcome::rejected`]; the rest
  /// of the batch still applies. Future-dated updates land in history only.
  pub fn apply_updates(
    &mut self,
    updates: Vec<UpdateRecord>,
    source: UpdateSource,
  ) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();

    let (valid, rejected): (Vec<_>, Vec<_>) = updates
      .into_iter()
      .partition(|u| self.registry.contains(u.topic.as_str()));
    outcome.rejected = rejected
      .into_iter()
      .map(|update| RejectedUpdate {
        update,
        reason: RejectReason::UnknownTopic,
      })
      .collect();

    for update in valid {
      self.apply_one(update, source, &mut outcome);
    }
    outcome
  }

  fn apply_one(
    &mut self,
    update: UpdateRecord,
    source: UpdateSource,
    outcome: &mut ApplyOutcome,
  ) {
    let UpdateRecord {
      topic,
      field,
      value,
      confidence,
      temporal_context,
      is_correction,
      reasoning,
    } = update;

    let previous = self
      .snapshots
      .get(&topic)
      .and_then(|s| s.get(&field))
      .filter(|v| !v.is_null())
      .cloned();
    let value = merge(previous.as_ref(), value);
    let now = self.tick();

    let mut entry = FieldHistoryEntry {
      seq: 0,
      topic: topic.clone(),
      field: field.clone(),
      value: value.clone(),
      recorded_at: now,
      source,
      previous_value: previous.clone(),
      temporal_context,
      is_projection: false,
      is_correction,
      confidence,
      category: None,
      reasoning: reasoning.clone(),
    };

    if temporal_context == TemporalContext::Future {
      entry.is_projection = true;
      outcome.projections += 1;
      self.push_history(entry);
      return;
    }

    let semantics = self
      .registry
      .field_semantics(topic.as_str(), &field)
      .cloned()
      .unwrap_or_else(|| FieldSemantics::inferred(&value));
    let protective = self.registry.protective_topics();

    match &previous {
      None => {
        let c = classify(&Value::Null, &value, &topic, &semantics, protective);
        if c.category == ConflictCategory::TopologyConflict
          && c.suggests_priority()
        {
          outcome.triggers.push(PriorityTrigger {
            topic: topic.clone(),
            field: field.clone(),
            category: c.category,
            suggested_topics: c.suggested_priority_topics,
            discovery: true,
          });
        }
      }
      Some(old) if values_equal(old, &value) => {}
      Some(old) => {
        let c = classify(old, &value, &topic, &semantics, protective);
        entry.category = Some(c.category);
        if c.suggests_priority() {
          outcome.triggers.push(PriorityTrigger {
            topic: topic.clone(),
            field: field.clone(),
            category: c.category,
            suggested_topics: c.suggested_priority_topics.clone(),
            discovery: false,
          });
        }
        let conflict = Conflict {
          topic: topic.clone(),
          field: field.clone(),
          old_value: old.clone(),
          new_value: value.clone(),
          category: c.category,
          suggested_topics: c.suggested_priority_topics,
          detected_at: now,
          reasoning,
        };
        self.conflicts.push(conflict.clone());
        outcome.conflicts.push(conflict);
      }
    }

    self.materialise(&topic).insert(field, value);
    if !outcome.touched.contains(&topic) {
      outcome.touched.push(topic);
    }
    self.push_history(entry);
  }

  /// Record a scheduler decision.
  pub fn record_edge(
    &mut self,
    from_topic: Option<TopicName>,
    to_topic: TopicName,
    reason: impl Into<String>,
  ) {
    let timestamp = self.tick();
    self.edges.push(Edge {
      from_topic,
      to_topic,
      reason: reason.into(),
      timestamp,
    });
  }

  fn materialise(&mut self, topic: &TopicName) -> &mut Snapshot {
    if !self.snapshots.contains_key(topic) {
      self.traversal_order.push(topic.clone());
    }
    self.snapshots.entry(topic.clone()).or_default()
  }

  fn push_history(&mut self, mut entry: FieldHistoryEntry) {
    entry.seq = self.next_seq;
    self.next_seq += 1;
    self
      .history
      .entry(entry.topic.clone())
      .or_default()
      .entry(entry.field.clone())
      .or_default()
      .push(entry);
  }

  /// Current time, clamped so it never runs backwards within this store.
  fn tick(&mut self) -> DateTime<Utc> {
    let now = Utc::now();
    let now = match self.last_at {
      Some(last) if last > now => last,
      _ => now,
    };
    self.last_at = Some(now);
    now
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub fn get_snapshot(&self, topic: &str) -> Option<&Snapshot> {
    self.snapshots.get(topic)
  }

  pub fn all_snapshots(&self) -> &BTreeMap<TopicName, Snapshot> {
    &self.snapshots
  }

  /// History of one field, oldest first. Empty if the field was never written.
  pub fn get_field_history(&self, topic: &str, field: &str) -> &[FieldHistoryEntry] {
    self
      .history
      .get(topic)
      .and_then(|fields| fields.get(field))
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  pub fn has_conflicts(&self, topic: &str) -> bool {
    self.conflicts.iter().any(|c| c.topic == topic)
  }

  pub fn conflicts(&self) -> &[Conflict] { &self.conflicts }

  pub fn edges(&self) -> &[Edge] { &self.edges }

  /// Topics in the order their snapshot first materialised.
  pub fn traversal_order(&self) -> &[TopicName] { &self.traversal_order }

  pub fn missing_fields(&self, topic: &str) -> Vec<String> {
    let empty = Snapshot::new();
    let snapshot = self.snapshots.get(topic).unwrap_or(&empty);
    self.registry.missing_fields(topic, snapshot)
  }

  /// Whether the registry's collection rules are satisfied for `topic`.
  pub fn is_complete(&self, topic: &str) -> bool {
    self.registry.contains(topic) && self.missing_fields(topic).is_empty()
  }

  pub fn node_with_history(&self, topic: &str) -> Option<TopicAudit> {
    let name = self.registry.get(topic)?.name.clone();
    Some(TopicAudit {
      snapshot:  self.snapshots.get(topic).cloned().unwrap_or_default(),
      history:   self.history.get(topic).cloned().unwrap_or_default(),
      conflicts: self
        .conflicts
        .iter()
        .filter(|c| c.topic == topic)
        .cloned()
        .collect(),
      topic:     name,
    })
  }
}
