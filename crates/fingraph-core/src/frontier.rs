//! The frontier: which topics are done, which are queued, and in what order.
//!
//! Three disjoint sets are maintained:
//!
//! - `visited`: topics whose collection has finished. Never re-queued.
//! - `pending`: ordered queue of topics still to cover, head first.
//! - `dismissed`: topics the ranking agent judged irrelevant. Sticky against
//!   re-ranking, but an explicit priority request revives them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, graph::GraphStore, topic::TopicName};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontier {
  visited:   BTreeSet<TopicName>,
  pending:   Vec<TopicName>,
  #[serde(default)]
  dismissed: BTreeSet<TopicName>,
}

/// Serialisable form of a [`Frontier`].
pub type FrontierRecord = Frontier;

impl Frontier {
  pub fn new() -> Self { Self::default() }

  /// Queue `topics` in order behind whatever is already pending.
  pub fn seed(&mut self, topics: &[TopicName]) {
    for topic in topics {
      if !self.is_visited(topic)
        && !self.dismissed.contains(topic)
        && !self.is_pending(topic)
      {
        self.pending.push(topic.clone());
      }
    }
  }

  /// Move `topic` from pending (if queued) into visited.
  ///
  /// Returns `false` if it was already visited.
  pub fn mark_visited(&mut self, topic: &TopicName) -> bool {
    self.pending.retain(|t| t != topic);
    self.dismissed.remove(topic);
    self.visited.insert(topic.clone())
  }

  /// Replace the pending order with `ranked`, then append any previously
  /// pending topic the ranking left out, in its old relative order.
  ///
  /// Visited and dismissed topics in `ranked` are skipped, as are duplicates.
  pub fn merge_ranked(&mut self, ranked: &[TopicName]) {
    let previous = std::mem::take(&mut self.pending);
    for topic in ranked {
      if !self.is_visited(topic)
        && !self.dismissed.contains(topic)
        && !self.is_pending(topic)
      {
        self.pending.push(topic.clone());
      }
    }
    for topic in previous {
      if !self.is_pending(&topic) {
        self.pending.push(topic);
      }
    }
  }

  /// Put `topics` at the head of the queue, in the given order.
  ///
  /// Visited topics are ignored. Dismissed topics are revived.
  pub fn force_priority(&mut self, topics: &[TopicName]) {
    let mut front: Vec<TopicName> = Vec::new();
    for topic in topics {
      if !self.is_visited(topic) && !front.contains(topic) {
        front.push(topic.clone());
      }
    }
    for topic in &front {
      self.dismissed.remove(topic);
    }
    self.pending.retain(|t| !front.contains(t));
    front.append(&mut self.pending);
    self.pending = front;
  }

  /// Drop `topics` from the queue for the rest of the session unless a later
  /// priority request brings them back. Visited topics are unaffected.
  pub fn dismiss(&mut self, topics: &[TopicName]) {
    for topic in topics {
      if self.is_visited(topic) {
        continue;
      }
      self.pending.retain(|t| t != topic);
      self.dismissed.insert(topic.clone());
    }
  }

  /// Head of the queue.
  pub fn select_next(&self) -> Option<&TopicName> { self.pending.first() }

  /// Mark every pending topic whose collection rules are already satisfied
  /// as visited. Returns the topics that moved.
  pub fn sync_completion(&mut self, graph: &GraphStore) -> Vec<TopicName> {
    let done: Vec<TopicName> = self
      .pending
      .iter()
      .filter(|t| graph.is_complete(t.as_str()))
      .cloned()
      .collect();
    for topic in &done {
      self.mark_visited(topic);
    }
    done
  }

  /// Check that the three sets are disjoint and the queue has no repeats.
  pub fn check_invariants(&self) -> Result<()> {
    let mut seen = BTreeSet::new();
    for topic in &self.pending {
      if !seen.insert(topic) {
        return Err(Error::InvariantViolation(format!(
          "{topic} is queued twice"
        )));
      }
      if self.visited.contains(topic) {
        return Err(Error::InvariantViolation(format!(
          "{topic} is both pending and visited"
        )));
      }
      if self.dismissed.contains(topic) {
        return Err(Error::InvariantViolation(format!(
          "{topic} is both pending and dismissed"
        )));
      }
    }
    if let Some(topic) = self.visited.intersection(&self.dismissed).next() {
      return Err(Error::InvariantViolation(format!(
        "{topic} is both visited and dismissed"
      )));
    }
    Ok(())
  }

  /// Restore the invariants, preferring visited over pending over dismissed
  /// and keeping the first occurrence of a repeated topic.
  pub fn repair(&mut self) {
    let mut seen = BTreeSet::new();
    let visited = &self.visited;
    self
      .pending
      .retain(|t| !visited.contains(t) && seen.insert(t.clone()));
    let pending = &self.pending;
    self
      .dismissed
      .retain(|t| !visited.contains(t) && !pending.contains(t));
  }

  pub fn visited(&self) -> &BTreeSet<TopicName> { &self.visited }

  pub fn pending(&self) -> &[TopicName] { &self.pending }

  pub fn dismissed(&self) -> &BTreeSet<TopicName> { &self.dismissed }

  pub fn is_visited(&self, topic: &TopicName) -> bool {
    self.visited.contains(topic)
  }

  pub fn is_pending(&self, topic: &TopicName) -> bool {
    self.pending.contains(topic)
  }

  /// The next `n` queued topics.
  pub fn upcoming(&self, n: usize) -> &[TopicName] {
    &self.pending[..n.min(self.pending.len())]
  }

  pub fn to_record(&self) -> FrontierRecord { self.clone() }

  /// Rebuild from a record, rejecting one that breaks the invariants.
  pub fn from_record(record: FrontierRecord) -> Result<Self> {
    record.check_invariants()?;
    Ok(record)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use proptest::prelude::*;
  use serde_json::json;

  use super::*;
  use crate::{
    graph::{UpdateRecord, UpdateSource},
    schema::SchemaRegistry,
  };

  fn names(raw: &[&str]) -> Vec<TopicName> {
    raw.iter().map(|t| TopicName::from(*t)).collect()
  }

  #[test]
  fn merge_keeps_unranked_pending_topics() {
    let mut f = Frontier::new();
    f.seed(&names(&["A"]));
    f.merge_ranked(&names(&["B", "C"]));
    assert_eq!(f.pending(), names(&["B", "C", "A"]).as_slice());
  }

  #[test]
  fn merge_skips_visited_and_dismissed() {
    let mut f = Frontier::new();
    f.seed(&names(&["A", "B"]));
    f.mark_visited(&"A".into());
    f.dismiss(&names(&["C"]));
    f.merge_ranked(&names(&["C", "A", "D", "D"]));
    assert_eq!(f.pending(), names(&["D", "B"]).as_slice());
  }

  #[test]
  fn force_priority_reorders_and_revives() {
    let mut f = Frontier::new();
    f.seed(&names(&["A", "B", "C"]));
    f.mark_visited(&"A".into());
    f.dismiss(&names(&["D"]));

    f.force_priority(&names(&["D", "A", "C"]));
    assert_eq!(f.pending(), names(&["D", "C", "B"]).as_slice());
    assert!(f.dismissed().is_empty());
    assert_eq!(f.select_next(), Some(&"D".into()));
    f.check_invariants().unwrap();
  }

  #[test]
  fn mark_visited_is_idempotent() {
    let mut f = Frontier::new();
    f.seed(&names(&["A"]));
    assert!(f.mark_visited(&"A".into()));
    assert!(!f.mark_visited(&"A".into()));
    assert!(f.select_next().is_none());
  }

  #[test]
  fn sync_completion_moves_finished_topics() {
    let mut graph = GraphStore::new(Arc::new(SchemaRegistry::financial()));
    graph.apply_updates(
      vec![UpdateRecord::new("Goals", "goals", json!(["buy a house"]))],
      UpdateSource::Extraction,
    );

    let mut f = Frontier::new();
    f.seed(&names(&["Income", "Goals"]));
    assert_eq!(f.sync_completion(&graph), names(&["Goals"]));
    assert_eq!(f.pending(), names(&["Income"]).as_slice());
    assert!(f.is_visited(&"Goals".into()));
  }

  #[test]
  fn repair_restores_disjointness() {
    let raw = json!({
      "visited": ["A"],
      "pending": ["A", "B", "B", "C"],
      "dismissed": ["C", "D"],
    });
    let mut f: Frontier = serde_json::from_value(raw).unwrap();
    assert!(matches!(
      f.check_invariants(),
      Err(Error::InvariantViolation(_))
    ));
    assert!(Frontier::from_record(f.clone()).is_err());

    f.repair();
    f.check_invariants().unwrap();
    assert_eq!(f.pending(), names(&["B", "C"]).as_slice());
    assert_eq!(f.dismissed().iter().collect::<Vec<_>>(), vec![
      &TopicName::from("D")
    ]);
  }

  #[test]
  fn upcoming_is_bounded() {
    let mut f = Frontier::new();
    f.seed(&names(&["A", "B"]));
    assert_eq!(f.upcoming(5).len(), 2);
    assert_eq!(f.upcoming(1), names(&["A"]).as_slice());
  }

  #[derive(Debug, Clone)]
  enum Op {
    Visit(u8),
    Merge(Vec<u8>),
    Force(Vec<u8>),
    Dismiss(Vec<u8>),
  }

  fn topic(i: u8) -> TopicName { TopicName::new(format!("T{i}")) }

  fn topics(ids: &[u8]) -> Vec<TopicName> {
    ids.iter().copied().map(topic).collect()
  }

  fn op() -> impl Strategy<Value = Op> {
    let ids = || prop::collection::vec(0u8..8, 0..6);
    prop_oneof![
      (0u8..8).prop_map(Op::Visit),
      ids().prop_map(Op::Merge),
      ids().prop_map(Op::Force),
      ids().prop_map(Op::Dismiss),
    ]
  }

  proptest! {
    #[test]
    fn operations_preserve_invariants(
      seed in prop::collection::vec(0u8..8, 0..8),
      ops in prop::collection::vec(op(), 0..24),
    ) {
      let mut f = Frontier::new();
      f.seed(&topics(&seed));

      for op in ops {
        let visited_before = f.visited().clone();
        let pending_before = f.pending().to_vec();

        match op {
          Op::Visit(i) => {
            f.mark_visited(&topic(i));
          }
          Op::Merge(ids) => {
            f.merge_ranked(&topics(&ids));
            // A merge never loses a queued topic.
            for t in &pending_before {
              prop_assert!(f.is_pending(t));
            }
          }
          Op::Force(ids) => {
            let forced = topics(&ids);
            f.force_priority(&forced);
            let expected: Vec<_> = forced
              .iter()
              .filter(|t| !f.is_visited(t))
              .fold(Vec::new(), |mut acc, t| {
                if !acc.contains(t) {
                  acc.push(t.clone());
                }
                acc
              });
            prop_assert_eq!(f.upcoming(expected.len()), expected.as_slice());
          }
          Op::Dismiss(ids) => {
            f.dismiss(&topics(&ids));
          }
        }

        prop_assert!(f.check_invariants().is_ok());
        // Visited only ever grows.
        prop_assert!(visited_before.is_subset(f.visited()));
      }
    }
  }
}
