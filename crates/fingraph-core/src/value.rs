//! Helpers over the JSON values stored in snapshots.
//!
//! Field values arrive from external agents as arbitrary JSON, so comparisons
//! need to be a little more forgiving than `Value`'s own `PartialEq`: `80000`
//! and `80000.0` are the same income.

use serde_json::{Map, Value};

/// The value of a single field.
pub type FieldValue = Value;

/// Numeric view of a value, if it is a JSON number.
pub fn as_number(value: &Value) -> Option<f64> { value.as_f64() }

/// Structural equality, except that numbers compare by numeric value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
    (Value::Array(xs), Value::Array(ys)) => {
      xs.len() == ys.len()
        && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
    }
    (Value::Object(xs), Value::Object(ys)) => {
      xs.len() == ys.len()
        && xs
          .iter()
          .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
    }
    _ => a == b,
  }
}

/// A field counts as answered when its key exists with a non-null value.
/// `false`, `0`, and `{}` are all answers.
pub fn is_answered(value: Option<&Value>) -> bool {
  value.is_some_and(|v| !v.is_null())
}

pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}

/// Combine an incoming value with the stored one.
///
/// Map-valued fields (income streams, expense categories) accumulate key by
/// key with the incoming side winning; every other value replaces.
pub fn merge(previous: Option<&Value>, incoming: Value) -> Value {
  match (previous, incoming) {
    (Some(Value::Object(old)), Value::Object(new)) => {
      let mut merged: Map<String, Value> = old.clone();
      merged.extend(new);
      Value::Object(merged)
    }
    (_, incoming) => incoming,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn numbers_compare_by_value() {
    assert!(values_equal(&json!(80000), &json!(80000.0)));
    assert!(!values_equal(&json!(80000), &json!(80001)));
    assert!(values_equal(&json!({"a": 1}), &json!({"a": 1.0})));
  }

  #[test]
  fn false_and_zero_are_answers() {
    assert!(is_answered(Some(&json!(false))));
    assert!(is_answered(Some(&json!(0))));
    assert!(!is_answered(Some(&Value::Null)));
    assert!(!is_answered(None));
  }

  #[test]
  fn maps_merge_and_scalars_replace() {
    let old = json!({"salary": 120000});
    let merged = merge(Some(&old), json!({"rental_income": 24000}));
    assert_eq!(merged, json!({"salary": 120000, "rental_income": 24000}));

    assert_eq!(merge(Some(&json!(1)), json!(2)), json!(2));
    assert_eq!(merge(None, json!({"a": 1})), json!({"a": 1}));
  }
}
