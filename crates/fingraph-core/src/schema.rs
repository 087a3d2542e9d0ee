//! Topic schemas and the registry the rest of the system validates against.
//!
//! A [`TopicSchema`] describes which fields a topic expects, what each field
//! *means* to the conflict classifier ([`FieldSemantics`]), and the mechanical
//! rule for when enough has been collected to move on ([`CollectionSpec`]).
//! The schemas themselves are owned externally; the core only reads them.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  Error, Result,
  graph::Snapshot,
  topic::TopicName,
  value::{as_number, is_answered, is_truthy, values_equal},
};

// ─── Field semantics ─────────────────────────────────────────────────────────

/// The broad shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
  Integer,
  Number,
  Boolean,
  Text,
  Category,
  List,
  Map,
}

impl FieldKind {
  pub fn is_numeric(self) -> bool { matches!(self, Self::Integer | Self::Number) }

  /// Best guess at the kind of an undeclared field from a value it holds.
  pub fn infer(value: &Value) -> Self {
    match value {
      Value::Bool(_) => Self::Boolean,
      Value::Number(n) if n.is_f64() => Self::Number,
      Value::Number(_) => Self::Integer,
      Value::Array(_) => Self::List,
      Value::Object(_) => Self::Map,
      Value::Null | Value::String(_) => Self::Text,
    }
  }
}

/// Which direction of numeric movement is bad news for a field.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AdverseDirection {
  /// Income, savings, balances.
  #[default]
  Decrease,
  /// Debt, repayments, costs.
  Increase,
}

/// Static mappings the classifier consults for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSemantics {
  pub kind:            FieldKind,
  /// Topics that must be collected once this field moves from an absent to a
  /// present state.
  #[serde(default)]
  pub implies_topics:  Vec<TopicName>,
  /// Values that mean "this life fact does not apply" (e.g. `"single"`).
  /// When empty, null/`false`/`0`/empty values are the absent states.
  #[serde(default)]
  pub absent_values:   Vec<Value>,
  /// Categorical states that are a severity event when entered.
  #[serde(default)]
  pub critical_values: Vec<Value>,
  #[serde(default)]
  pub adverse:         AdverseDirection,
}

impl FieldSemantics {
  pub fn new(kind: FieldKind) -> Self {
    Self {
      kind,
      implies_topics: Vec::new(),
      absent_values: Vec::new(),
      critical_values: Vec::new(),
      adverse: AdverseDirection::default(),
    }
  }

  /// Semantics for a field the schema does not declare.
  pub fn inferred(value: &Value) -> Self { Self::new(FieldKind::infer(value)) }

  /// Whether `value` is an absent or explicitly negative state.
  pub fn is_absent(&self, value: &Value) -> bool {
    if value.is_null() {
      return true;
    }
    if self.absent_values.is_empty() {
      !is_truthy(value)
    } else {
      self.absent_values.iter().any(|a| values_equal(a, value))
    }
  }

  pub fn is_critical(&self, value: &Value) -> bool {
    self.critical_values.iter().any(|c| values_equal(c, value))
  }
}

/// A declared field of a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub semantics:   FieldSemantics,
}

impl FieldSpec {
  pub fn new(
    name: impl Into<String>,
    kind: FieldKind,
    description: impl Into<String>,
  ) -> Self {
    Self {
      name:        name.into(),
      description: description.into(),
      semantics:   FieldSemantics::new(kind),
    }
  }

  pub fn implies(mut self, topics: &[&str]) -> Self {
    self.semantics.implies_topics =
      topics.iter().map(|t| TopicName::from(*t)).collect();
    self
  }

  pub fn absent_when(mut self, values: Vec<Value>) -> Self {
    self.semantics.absent_values = values;
    self
  }

  pub fn critical_when(mut self, values: Vec<Value>) -> Self {
    self.semantics.critical_values = values;
    self
  }

  pub fn adverse(mut self, direction: AdverseDirection) -> Self {
    self.semantics.adverse = direction;
    self
  }
}

// ─── Collection semantics ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
  #[serde(rename = "==")]
  Eq,
  #[serde(rename = "!=")]
  Ne,
  #[serde(rename = ">")]
  Gt,
  #[serde(rename = ">=")]
  Ge,
  #[serde(rename = "<")]
  Lt,
  #[serde(rename = "<=")]
  Le,
  #[serde(rename = "in")]
  In,
  #[serde(rename = "not_in")]
  NotIn,
  #[serde(rename = "truthy")]
  Truthy,
}

/// "If `if_field` satisfies the condition, `then_require` must be answered."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionCondition {
  pub if_field:     String,
  pub operator:     ConditionOp,
  #[serde(default)]
  pub value:        Value,
  pub then_require: Vec<String>,
}

impl CollectionCondition {
  pub fn new(
    if_field: &str,
    operator: ConditionOp,
    value: Value,
    then_require: &[&str],
  ) -> Self {
    Self {
      if_field: if_field.to_owned(),
      operator,
      value,
      then_require: then_require.iter().map(|f| (*f).to_owned()).collect(),
    }
  }

  /// Evaluate the condition against the current value of `if_field`.
  /// Comparisons between incompatible values are simply false.
  pub fn holds(&self, current: &Value) -> bool {
    let ordered = |cmp: fn(f64, f64) -> bool| match (
      as_number(current),
      as_number(&self.value),
    ) {
      (Some(a), Some(b)) => cmp(a, b),
      _ => false,
    };
    let listed = || {
      self
        .value
        .as_array()
        .map(|items| items.iter().any(|v| values_equal(v, current)))
    };

    match self.operator {
      ConditionOp::Truthy => is_truthy(current),
      ConditionOp::Eq => values_equal(current, &self.value),
      ConditionOp::Ne => !values_equal(current, &self.value),
      ConditionOp::Gt => ordered(|a, b| a > b),
      ConditionOp::Ge => ordered(|a, b| a >= b),
      ConditionOp::Lt => ordered(|a, b| a < b),
      ConditionOp::Le => ordered(|a, b| a <= b),
      ConditionOp::In => listed().unwrap_or(false),
      ConditionOp::NotIn => listed().is_some_and(|found| !found),
    }
  }
}

/// Minimum data that counts as "answered enough to move on".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
  #[serde(default)]
  pub required_fields:      Vec<String>,
  /// At least one of these must be answered.
  #[serde(default)]
  pub require_any_of:       Vec<String>,
  #[serde(default)]
  pub conditional_required: Vec<CollectionCondition>,
}

impl CollectionSpec {
  pub fn required(fields: &[&str]) -> Self {
    Self {
      required_fields: fields.iter().map(|f| (*f).to_owned()).collect(),
      ..Self::default()
    }
  }

  pub fn any_of(mut self, fields: &[&str]) -> Self {
    self.require_any_of = fields.iter().map(|f| (*f).to_owned()).collect();
    self
  }

  pub fn when(mut self, condition: CollectionCondition) -> Self {
    self.conditional_required.push(condition);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.required_fields.is_empty()
      && self.require_any_of.is_empty()
      && self.conditional_required.is_empty()
  }
}

// ─── Topic schema ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSchema {
  pub name:        TopicName,
  #[serde(default)]
  pub description: String,
  pub fields:      Vec<FieldSpec>,
  #[serde(default)]
  pub collection:  CollectionSpec,
}

impl TopicSchema {
  pub fn new(name: &str, description: impl Into<String>) -> Self {
    Self {
      name:        TopicName::from(name),
      description: description.into(),
      fields:      Vec::new(),
      collection:  CollectionSpec::default(),
    }
  }

  pub fn field(mut self, field: FieldSpec) -> Self {
    self.fields.push(field);
    self
  }

  pub fn collection(mut self, spec: CollectionSpec) -> Self {
    self.collection = spec;
    self
  }

  pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
    self.fields.iter().find(|f| f.name == name)
  }

  /// Fields still needed before this topic is complete, in the order they
  /// should be asked.
  pub fn missing_fields(&self, snapshot: &Snapshot) -> Vec<String> {
    let answered = |f: &str| is_answered(snapshot.get(f));

    if self.collection.is_empty() {
      return self
        .fields
        .iter()
        .filter(|f| !answered(&f.name))
        .map(|f| f.name.clone())
        .collect();
    }

    let mut missing: Vec<String> = Vec::new();
    let push = |f: &String, missing: &mut Vec<String>| {
      if !missing.contains(f) {
        missing.push(f.clone());
      }
    };

    for f in &self.collection.required_fields {
      if !answered(f) {
        push(f, &mut missing);
      }
    }

    let any_of = &self.collection.require_any_of;
    if !any_of.is_empty() && !any_of.iter().any(|f| answered(f)) {
      for f in any_of {
        push(f, &mut missing);
      }
    }

    for cond in &self.collection.conditional_required {
      let Some(current) = snapshot.get(&cond.if_field) else {
        continue;
      };
      if current.is_null() || !cond.holds(current) {
        continue;
      }
      for f in &cond.then_require {
        if !answered(f) {
          push(f, &mut missing);
        }
      }
    }

    missing
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Every topic the interview may visit, plus the static orderings that drive
/// scheduling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistry {
  topics:            Vec<TopicSchema>,
  /// Topics queued at session start, most urgent first.
  #[serde(default)]
  seed_order:        Vec<TopicName>,
  /// Topics prioritised after a severity event.
  #[serde(default)]
  protective_topics: Vec<TopicName>,
}

impl SchemaRegistry {
  pub fn new(topics: Vec<TopicSchema>) -> Self {
    Self {
      topics,
      seed_order: Vec::new(),
      protective_topics: Vec::new(),
    }
  }

  pub fn with_seed_order(mut self, topics: &[&str]) -> Self {
    self.seed_order = topics.iter().map(|t| TopicName::from(*t)).collect();
    self
  }

  pub fn with_protective_topics(mut self, topics: &[&str]) -> Self {
    self.protective_topics =
      topics.iter().map(|t| TopicName::from(*t)).collect();
    self
  }

  /// Parse a registry from JSON and check that every topic it mentions is
  /// declared.
  pub fn from_json(raw: &str) -> Result<Self> {
    let registry: Self = serde_json::from_str(raw)?;
    registry.validate()?;
    Ok(registry)
  }

  /// Reject registries whose orderings or mappings name undeclared topics.
  pub fn validate(&self) -> Result<()> {
    let mentioned = self
      .seed_order
      .iter()
      .chain(&self.protective_topics)
      .chain(
        self
          .topics
          .iter()
          .flat_map(|t| &t.fields)
          .flat_map(|f| &f.semantics.implies_topics),
      );
    for topic in mentioned {
      if !self.contains(topic.as_str()) {
        return Err(Error::UnknownTopic(topic.to_string()));
      }
    }
    Ok(())
  }

  pub fn contains(&self, topic: &str) -> bool { self.get(topic).is_some() }

  pub fn get(&self, topic: &str) -> Option<&TopicSchema> {
    self.topics.iter().find(|t| t.name == topic)
  }

  /// All schemas in declaration order.
  pub fn topics(&self) -> &[TopicSchema] { &self.topics }

  pub fn topic_names(&self) -> impl Iterator<Item = &TopicName> {
    self.topics.iter().map(|t| &t.name)
  }

  pub fn seed_order(&self) -> &[TopicName] { &self.seed_order }

  pub fn protective_topics(&self) -> &[TopicName] { &self.protective_topics }

  /// Declared semantics for `topic.field`, if the schema knows the field.
  pub fn field_semantics(
    &self,
    topic: &str,
    field: &str,
  ) -> Option<&FieldSemantics> {
    self
      .get(topic)
      .and_then(|t| t.get_field(field))
      .map(|f| &f.semantics)
  }

  /// Missing fields for `topic`; an unknown topic has nothing to collect.
  pub fn missing_fields(&self, topic: &str, snapshot: &Snapshot) -> Vec<String> {
    self
      .get(topic)
      .map(|t| t.missing_fields(snapshot))
      .unwrap_or_default()
  }

  pub fn is_complete(&self, topic: &str, snapshot: &Snapshot) -> bool {
    self.contains(topic) && self.missing_fields(topic, snapshot).is_empty()
  }

  /// The default personal-finance registry.
  pub fn financial() -> Self {
    use AdverseDirection::Increase;
    use FieldKind::*;

    let personal = TopicSchema::new(
      "Personal",
      "Personal circumstances that shape financial planning",
    )
    .field(FieldSpec::new("age", Integer, "Age in years"))
    .field(FieldSpec::new("occupation", Text, "Current occupation"))
    .field(
      FieldSpec::new(
        "employment_status",
        Category,
        "full_time, part_time, casual, contractor, self_employed, unemployed, retired",
      )
      .critical_when(vec![json!("unemployed")]),
    )
    .field(
      FieldSpec::new("married", Boolean, "Is the user married or partnered?")
        .implies(&["Marriage", "Dependents"]),
    )
    .field(
      FieldSpec::new(
        "marital_status",
        Category,
        "single, married, de_facto, divorced, widowed",
      )
      .absent_when(vec![
        Value::Null,
        json!("single"),
        json!("divorced"),
        json!("widowed"),
      ])
      .implies(&["Marriage"]),
    )
    .field(
      FieldSpec::new("has_children", Boolean, "Does the user have children?")
        .implies(&["Dependents"]),
    )
    .field(
      FieldSpec::new("children", Integer, "Number of children")
        .implies(&["Dependents"]),
    )
    .field(
      FieldSpec::new("has_debts", Boolean, "Does the user carry any debt?")
        .implies(&["Liabilities"]),
    )
    .field(FieldSpec::new(
      "health_conditions",
      List,
      "Health conditions affecting financial planning",
    ))
    .collection(
      CollectionSpec::required(&["age", "employment_status"])
        .any_of(&["married", "marital_status"]),
    );

    let marriage = TopicSchema::new("Marriage", "Spouse financial details")
      .field(FieldSpec::new("spouse_age", Integer, "Spouse age"))
      .field(
        FieldSpec::new("spouse_employment_status", Category, "Spouse employment")
          .critical_when(vec![json!("unemployed")]),
      )
      .field(FieldSpec::new(
        "spouse_income_annual",
        Number,
        "Spouse annual income",
      ))
      .collection(CollectionSpec::default().any_of(&[
        "spouse_age",
        "spouse_employment_status",
        "spouse_income_annual",
      ]));

    let dependents = TopicSchema::new(
      "Dependents",
      "Children and parents the user supports",
    )
    .field(FieldSpec::new("number_of_children", Integer, "Number of children"))
    .field(FieldSpec::new("children_ages", List, "Ages of children"))
    .field(
      FieldSpec::new(
        "annual_education_cost",
        Number,
        "Total annual education expenses",
      )
      .adverse(Increase),
    )
    .field(FieldSpec::new(
      "child_pathway",
      Category,
      "school, planning_uni, uni, apprenticeship, work, other",
    ))
    .field(FieldSpec::new(
      "education_funding_preference",
      Category,
      "hecs_help, parent_funded, mixed, unsure",
    ))
    .field(FieldSpec::new(
      "supporting_parents",
      Boolean,
      "Is the user financially supporting parents?",
    ))
    .field(
      FieldSpec::new(
        "monthly_parent_support",
        Number,
        "Monthly support provided to parents",
      )
      .adverse(Increase),
    )
    .collection(
      CollectionSpec::required(&["number_of_children", "supporting_parents"])
        .when(CollectionCondition::new(
          "number_of_children",
          ConditionOp::Gt,
          json!(0),
          &["children_ages", "child_pathway"],
        ))
        .when(CollectionCondition::new(
          "child_pathway",
          ConditionOp::In,
          json!(["planning_uni", "uni"]),
          &["education_funding_preference"],
        ))
        .when(CollectionCondition::new(
          "supporting_parents",
          ConditionOp::Truthy,
          Value::Null,
          &["monthly_parent_support"],
        )),
    );

    let income = TopicSchema::new("Income", "Income from every source")
      .field(FieldSpec::new("annual_income", Number, "Total annual income"))
      .field(FieldSpec::new(
        "income_streams_annual",
        Map,
        "Annual income keyed by source (salary, rental_income, ...)",
      ))
      .field(FieldSpec::new(
        "primary_income_type",
        Category,
        "Main source of income",
      ))
      .field(
        FieldSpec::new("is_stable", Boolean, "Is the primary income stable?")
          .critical_when(vec![json!(false)]),
      )
      .collection(
        CollectionSpec::default()
          .any_of(&["annual_income", "income_streams_annual"]),
      );

    let expenses = TopicSchema::new("Expenses", "Monthly spending")
      .field(FieldSpec::new(
        "monthly_expenses",
        Map,
        "Monthly expenses keyed by category",
      ))
      .field(
        FieldSpec::new("total_monthly", Number, "Total monthly expenses")
          .adverse(Increase),
      )
      .collection(
        CollectionSpec::default().any_of(&["monthly_expenses", "total_monthly"]),
      );

    let savings = TopicSchema::new("Savings", "Liquid savings")
      .field(FieldSpec::new("total_savings", Number, "Total liquid savings"))
      .field(FieldSpec::new(
        "savings_rate_monthly",
        Number,
        "Amount saved each month",
      ))
      .collection(
        CollectionSpec::default()
          .any_of(&["total_savings", "savings_rate_monthly"]),
      );

    let emergency = TopicSchema::new("Emergency", "Emergency buffer")
      .field(FieldSpec::new(
        "has_emergency_fund",
        Boolean,
        "Does the user keep an emergency fund?",
      ))
      .field(FieldSpec::new(
        "emergency_fund_months",
        Integer,
        "Months of expenses the fund covers",
      ))
      .collection(CollectionSpec::required(&["has_emergency_fund"]).when(
        CollectionCondition::new(
          "has_emergency_fund",
          ConditionOp::Truthy,
          Value::Null,
          &["emergency_fund_months"],
        ),
      ));

    let assets = TopicSchema::new("Assets", "Property, shares, and other assets")
      .field(
        FieldSpec::new("owns_property", Boolean, "Does the user own property?")
          .implies(&["Liabilities", "Insurance"]),
      )
      .field(FieldSpec::new(
        "asset_current_amount",
        Map,
        "Current value keyed by asset category",
      ))
      .collection(CollectionSpec::required(&["asset_current_amount"]));

    let liabilities = TopicSchema::new("Liabilities", "Loans and other debts")
      .field(FieldSpec::new(
        "liabilities",
        Map,
        "Outstanding balance keyed by debt type",
      ))
      .field(
        FieldSpec::new("total_debt", Number, "Total outstanding debt")
          .adverse(Increase),
      )
      .field(
        FieldSpec::new(
          "monthly_repayments",
          Number,
          "Total monthly repayments",
        )
        .adverse(Increase),
      )
      .collection(CollectionSpec::required(&["liabilities"]));

    let insurance = TopicSchema::new("Insurance", "Insurance cover in place")
      .field(FieldSpec::new(
        "coverages",
        Map,
        "Cover keyed by insurance type (life, tpd, income_protection, ...)",
      ))
      .collection(CollectionSpec::required(&["coverages"]));

    let retirement = TopicSchema::new("Retirement", "Superannuation and retirement")
      .field(FieldSpec::new("super_balance", Number, "Superannuation balance"))
      .field(FieldSpec::new(
        "target_retirement_age",
        Integer,
        "Age the user hopes to retire",
      ))
      .collection(CollectionSpec::required(&["super_balance"]));

    let goals = TopicSchema::new("Goals", "What the user wants to achieve")
      .field(FieldSpec::new("goals", List, "Stated financial goals"))
      .field(FieldSpec::new("top_priority", Text, "The most important goal"))
      .collection(CollectionSpec::required(&["goals"]));

    Self::new(vec![
      personal,
      marriage,
      dependents,
      income,
      expenses,
      savings,
      emergency,
      assets,
      liabilities,
      insurance,
      retirement,
      goals,
    ])
    .with_seed_order(&["Personal", "Income", "Expenses", "Savings", "Goals"])
    .with_protective_topics(&["Emergency", "Insurance", "Liabilities", "Goals"])
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn snapshot(pairs: &[(&str, Value)]) -> Snapshot {
    pairs
      .iter()
      .map(|(k, v)| ((*k).to_owned(), v.clone()))
      .collect()
  }

  #[test]
  fn financial_registry_is_self_consistent() {
    let registry = SchemaRegistry::financial();
    registry.validate().unwrap();
    assert_eq!(registry.topics().len(), 12);
    assert_eq!(registry.seed_order()[0], "Personal");
  }

  #[test]
  fn required_and_any_of_fields_are_reported() {
    let registry = SchemaRegistry::financial();
    let missing = registry.missing_fields("Personal", &Snapshot::new());
    assert_eq!(
      missing,
      vec!["age", "employment_status", "married", "marital_status"]
    );

    let partial = snapshot(&[("age", json!(34)), ("married", json!(false))]);
    assert_eq!(
      registry.missing_fields("Personal", &partial),
      vec!["employment_status"]
    );
  }

  #[test]
  fn conditional_requirements_trigger_on_value() {
    let registry = SchemaRegistry::financial();
    let none = snapshot(&[
      ("number_of_children", json!(0)),
      ("supporting_parents", json!(false)),
    ]);
    assert!(registry.is_complete("Dependents", &none));

    let two = snapshot(&[
      ("number_of_children", json!(2)),
      ("supporting_parents", json!(false)),
      ("child_pathway", json!("uni")),
    ]);
    assert_eq!(
      registry.missing_fields("Dependents", &two),
      vec!["children_ages", "education_funding_preference"]
    );
  }

  #[test]
  fn empty_collection_spec_requires_every_field() {
    let schema = TopicSchema::new("Notes", "")
      .field(FieldSpec::new("a", FieldKind::Text, ""))
      .field(FieldSpec::new("b", FieldKind::Text, ""));
    let snap = snapshot(&[("a", json!("x"))]);
    assert_eq!(schema.missing_fields(&snap), vec!["b"]);
  }

  #[test]
  fn condition_operators() {
    let gt = CollectionCondition::new("n", ConditionOp::Gt, json!(0), &[]);
    assert!(gt.holds(&json!(2)));
    assert!(!gt.holds(&json!("two")));

    let not_in =
      CollectionCondition::new("p", ConditionOp::NotIn, json!(["uni"]), &[]);
    assert!(not_in.holds(&json!("school")));
    assert!(!not_in.holds(&json!("uni")));
  }

  #[test]
  fn validate_rejects_undeclared_topics() {
    let registry = SchemaRegistry::new(vec![TopicSchema::new("A", "")])
      .with_seed_order(&["A", "B"]);
    assert!(matches!(
      registry.validate(),
      Err(Error::UnknownTopic(name)) if name == "B"
    ));
  }

  #[test]
  fn registry_round_trips_through_json() {
    let registry = SchemaRegistry::financial();
    let raw = serde_json::to_string(&registry).unwrap();
    let parsed = SchemaRegistry::from_json(&raw).unwrap();
    assert_eq!(parsed, registry);
  }
}
