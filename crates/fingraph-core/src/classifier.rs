//! Three-way classification of a field change.
//!
//! [`classify`] is a pure function: it sees the old and new value, the topic
//! the field belongs to, and the field's static semantics, and always returns
//! exactly one [`ConflictCategory`]. Rules are evaluated in a fixed order and
//! the first match wins:
//!
//! 1. **Topology**: the new value brings a life fact into existence that was
//!    absent before (not married → married), so dependent topics must be
//!    collected.
//! 2. **Severity**: a numeric field moved more than
//!    [`SEVERITY_MIN_DELTA`] in its adverse direction, dropped to zero, or a
//!    categorical field entered a critical state.
//! 3. **Value update**: anything else.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::{
  schema::{AdverseDirection, FieldSemantics},
  topic::TopicName,
  value::as_number,
};

/// Relative changes at or below this magnitude are routine updates.
pub const VALUE_UPDATE_MAX_DELTA: f64 = 0.3;

/// Adverse relative changes strictly above this magnitude are severity events.
pub const SEVERITY_MIN_DELTA: f64 = 0.5;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictCategory {
  TopologyConflict,
  SeverityConflict,
  ValueUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
  pub category:                  ConflictCategory,
  /// Topics to move to the front of the frontier, most urgent first.
  pub suggested_priority_topics: Vec<TopicName>,
  /// Signed relative change, when both values are numeric and the old value
  /// is nonzero.
  pub delta:                     Option<f64>,
}

impl Classification {
  fn value_update(delta: Option<f64>) -> Self {
    Self {
      category: ConflictCategory::ValueUpdate,
      suggested_priority_topics: Vec::new(),
      delta,
    }
  }

  pub fn suggests_priority(&self) -> bool {
    !self.suggested_priority_topics.is_empty()
  }

  /// Whether the change fell in the band between a routine update and a
  /// severity event. Kept for audit only; it never changes the category.
  pub fn is_warning(&self) -> bool { self.delta.is_some_and(is_warning_band) }
}

/// `(VALUE_UPDATE_MAX_DELTA, SEVERITY_MIN_DELTA]` by magnitude.
pub fn is_warning_band(delta: f64) -> bool {
  let magnitude = delta.abs();
  magnitude > VALUE_UPDATE_MAX_DELTA && magnitude <= SEVERITY_MIN_DELTA
}

/// Signed relative change from `old` to `new`; `None` when `old` is zero.
pub fn relative_delta(old: f64, new: f64) -> Option<f64> {
  (old != 0.0).then(|| (new - old) / old.abs())
}

/// Classify a change of `topic.field` from `old` to `new`.
///
/// `protective_topics` is the static set suggested after a severity event.
/// The field's own topic is never suggested back to itself.
pub fn classify(
  old: &Value,
  new: &Value,
  topic: &TopicName,
  semantics: &FieldSemantics,
  protective_topics: &[TopicName],
) -> Classification {
  let others = |topics: &[TopicName]| -> Vec<TopicName> {
    let mut out: Vec<TopicName> = Vec::new();
    for t in topics {
      if t != topic && !out.contains(t) {
        out.push(t.clone());
      }
    }
    out
  };

  let numeric = match (as_number(old), as_number(new)) {
    (Some(o), Some(n)) => Some((o, n)),
    _ => None,
  };
  let delta = numeric.and_then(|(o, n)| relative_delta(o, n));

  if !semantics.implies_topics.is_empty()
    && semantics.is_absent(old)
    && !semantics.is_absent(new)
  {
    return Classification {
      category: ConflictCategory::TopologyConflict,
      suggested_priority_topics: others(&semantics.implies_topics),
      delta,
    };
  }

  let severe = match numeric {
    Some((o, n)) => is_severe_move(o, n, semantics.adverse),
    None => semantics.is_critical(new) && !semantics.is_critical(old),
  };
  if severe {
    return Classification {
      category: ConflictCategory::SeverityConflict,
      suggested_priority_topics: others(protective_topics),
      delta,
    };
  }

  Classification::value_update(delta)
}

fn is_severe_move(old: f64, new: f64, adverse: AdverseDirection) -> bool {
  match relative_delta(old, new) {
    Some(delta) => match adverse {
      AdverseDirection::Decrease => {
        (new == 0.0 && old > 0.0) || delta < -SEVERITY_MIN_DELTA
      }
      AdverseDirection::Increase => delta > SEVERITY_MIN_DELTA,
    },
    // Zero is the healthy baseline only for fields where growth is bad.
    None => adverse == AdverseDirection::Increase && new != 0.0,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::schema::{FieldKind, SchemaRegistry};

  fn protective() -> Vec<TopicName> {
    SchemaRegistry::financial().protective_topics().to_vec()
  }

  fn numeric() -> FieldSemantics { FieldSemantics::new(FieldKind::Number) }

  fn run(old: Value, new: Value) -> Classification {
    classify(&old, &new, &"Income".into(), &numeric(), &protective())
  }

  #[test]
  fn drop_to_zero_is_severe() {
    let c = run(json!(80000), json!(0));
    assert_eq!(c.category, ConflictCategory::SeverityConflict);
    assert_eq!(
      c.suggested_priority_topics,
      vec![
        TopicName::from("Emergency"),
        "Insurance".into(),
        "Liabilities".into(),
        "Goals".into()
      ]
    );
  }

  #[test]
  fn ten_percent_rise_is_routine() {
    let c = run(json!(80000), json!(88000));
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
    assert!(c.suggested_priority_topics.is_empty());
    assert!(!c.is_warning());
  }

  #[test]
  fn drop_beyond_half_is_severe() {
    let c = run(json!(80000), json!(39000));
    assert_eq!(c.category, ConflictCategory::SeverityConflict);
  }

  #[test]
  fn threshold_boundaries() {
    // Exactly 30% down: routine, outside the warning band.
    let c = run(json!(80000), json!(56000));
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
    assert!(!c.is_warning());

    // Exactly 50% down: still not severe, but in the warning band.
    let c = run(json!(80000), json!(40000));
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
    assert!(c.is_warning());

    // 40% down sits inside the band.
    let c = run(json!(80000), json!(48000));
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
    assert!(c.is_warning());
  }

  #[test]
  fn large_rise_is_not_adverse_for_income() {
    let c = run(json!(80000), json!(200000));
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
  }

  #[test]
  fn debt_growth_is_adverse() {
    let mut debt = numeric();
    debt.adverse = AdverseDirection::Increase;
    let topic = TopicName::from("Liabilities");

    let c = classify(&json!(10000), &json!(20000), &topic, &debt, &protective());
    assert_eq!(c.category, ConflictCategory::SeverityConflict);
    assert!(!c.suggested_priority_topics.contains(&topic));

    let c = classify(&json!(0), &json!(5000), &topic, &debt, &protective());
    assert_eq!(c.category, ConflictCategory::SeverityConflict);

    let c = classify(&json!(10000), &json!(2000), &topic, &debt, &protective());
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
  }

  #[test]
  fn zero_baseline_income_rise_is_routine() {
    let c = run(json!(0), json!(50000));
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
    assert_eq!(c.delta, None);
  }

  #[test]
  fn has_children_flip_is_topology() {
    let registry = SchemaRegistry::financial();
    let semantics = registry
      .field_semantics("Personal", "has_children")
      .unwrap();
    let c = classify(
      &json!(false),
      &json!(true),
      &"Personal".into(),
      semantics,
      registry.protective_topics(),
    );
    assert_eq!(c.category, ConflictCategory::TopologyConflict);
    assert!(c.suggested_priority_topics.contains(&"Dependents".into()));
  }

  #[test]
  fn marital_status_uses_explicit_absent_values() {
    let registry = SchemaRegistry::financial();
    let semantics = registry
      .field_semantics("Personal", "marital_status")
      .unwrap();
    let topic = TopicName::from("Personal");

    let c = classify(
      &json!("single"),
      &json!("married"),
      &topic,
      semantics,
      registry.protective_topics(),
    );
    assert_eq!(c.category, ConflictCategory::TopologyConflict);
    assert_eq!(c.suggested_priority_topics, vec![TopicName::from("Marriage")]);

    // Present → absent is a correction, not new topology.
    let c = classify(
      &json!("married"),
      &json!("divorced"),
      &topic,
      semantics,
      registry.protective_topics(),
    );
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
  }

  #[test]
  fn entering_a_critical_state_is_severe() {
    let registry = SchemaRegistry::financial();
    let semantics = registry
      .field_semantics("Personal", "employment_status")
      .unwrap();
    let topic = TopicName::from("Personal");

    let c = classify(
      &json!("full_time"),
      &json!("unemployed"),
      &topic,
      semantics,
      registry.protective_topics(),
    );
    assert_eq!(c.category, ConflictCategory::SeverityConflict);

    let c = classify(
      &json!("unemployed"),
      &json!("full_time"),
      &topic,
      semantics,
      registry.protective_topics(),
    );
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
  }

  #[test]
  fn non_numeric_corrections_are_routine() {
    let c = classify(
      &json!("nurse"),
      &json!("teacher"),
      &"Personal".into(),
      &FieldSemantics::new(FieldKind::Text),
      &protective(),
    );
    assert_eq!(c.category, ConflictCategory::ValueUpdate);
  }

  #[test]
  fn category_names_are_snake_case() {
    assert_eq!(
      ConflictCategory::TopologyConflict.to_string(),
      "topology_conflict"
    );
    assert_eq!(
      "severity_conflict".parse::<ConflictCategory>().unwrap(),
      ConflictCategory::SeverityConflict
    );
  }
}
