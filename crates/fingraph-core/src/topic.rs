//! Topic names, the stable identifiers of fact categories.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// The name of a topic (e.g. `Income`, `Dependents`).
///
/// Topics are referenced by name long before any data exists for them, so the
/// name is the only identity they have.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TopicName(String);

impl TopicName {
  pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TopicName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for TopicName {
  fn from(name: &str) -> Self { Self(name.to_owned()) }
}

impl From<String> for TopicName {
  fn from(name: String) -> Self { Self(name) }
}

impl Borrow<str> for TopicName {
  fn borrow(&self) -> &str { &self.0 }
}

impl PartialEq<str> for TopicName {
  fn eq(&self, other: &str) -> bool { self.0 == other }
}

impl PartialEq<&str> for TopicName {
  fn eq(&self, other: &&str) -> bool { self.0 == *other }
}
