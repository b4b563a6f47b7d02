//! Answer values and the rules for accepting them.
//!
//! An answer is stored as an opaque JSON value, but only two shapes are
//! meaningful: a single scalar, or a flat list of scalars. Anything else
//! (null, objects, nested lists) is rejected at the boundary.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  question::{Cardinality, Question, QuestionType},
};

// ─── Values ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
  Text(String),
  Number(serde_json::Number),
  Bool(bool),
}

impl Scalar {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  fn into_json(self) -> Value {
    match self {
      Self::Text(s) => Value::String(s),
      Self::Number(n) => Value::Number(n),
      Self::Bool(b) => Value::Bool(b),
    }
  }
}

/// Frequency-table key: strings verbatim, numbers and booleans in their JSON
/// spelling.
impl fmt::Display for Scalar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text(s) => f.write_str(s),
      Self::Number(n) => write!(f, "{n}"),
      Self::Bool(b) => write!(f, "{b}"),
    }
  }
}

/// The value of one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum AnswerValue {
  Scalar(Scalar),
  List(Vec<Scalar>),
}

impl AnswerValue {
  pub fn text(s: impl Into<String>) -> Self { Self::Scalar(Scalar::Text(s.into())) }

  pub fn list<I, T>(items: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    Self::List(items.into_iter().map(|s| Scalar::Text(s.into())).collect())
  }

  /// The frequency-table buckets this answer contributes to.
  ///
  /// Multi-value questions count every element; single-value questions count
  /// one bucket per answer, taking the first element of a list-shaped value.
  /// A scalar stored under a multi-value question is counted as a one-element
  /// list; an empty list under a single-value question contributes nothing.
  pub fn buckets(&self, cardinality: Cardinality) -> Vec<String> {
    match (self, cardinality) {
      (Self::Scalar(s), _) => vec![s.to_string()],
      (Self::List(items), Cardinality::Multi) => {
        items.iter().map(ToString::to_string).collect()
      }
      (Self::List(items), Cardinality::Single) => {
        items.first().map(ToString::to_string).into_iter().collect()
      }
    }
  }
}

fn scalar_from_json(value: Value) -> Result<Scalar> {
  match value {
    Value::String(s) => Ok(Scalar::Text(s)),
    Value::Number(n) => Ok(Scalar::Number(n)),
    Value::Bool(b) => Ok(Scalar::Bool(b)),
    Value::Null => Err(Error::validation("answer values must not contain null")),
    Value::Array(_) | Value::Object(_) => Err(Error::validation(
      "answer value must be a scalar or a flat list of scalars",
    )),
  }
}

impl TryFrom<Value> for AnswerValue {
  type Error = Error;

  fn try_from(value: Value) -> Result<Self> {
    match value {
      Value::Null => Err(Error::validation("answer value must not be null")),
      Value::Array(items) => Ok(Self::List(
        items.into_iter().map(scalar_from_json).collect::<Result<_>>()?,
      )),
      other => Ok(Self::Scalar(scalar_from_json(other)?)),
    }
  }
}

impl From<AnswerValue> for Value {
  fn from(value: AnswerValue) -> Self {
    match value {
      AnswerValue::Scalar(s) => s.into_json(),
      AnswerValue::List(items) => {
        Value::Array(items.into_iter().map(Scalar::into_json).collect())
      }
    }
  }
}

// ─── Answer ──────────────────────────────────────────────────────────────────

/// A persisted answer: one value for one question within one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
  pub answer_id:     i64,
  pub submission_id: i64,
  pub question_id:   i64,
  pub answer_value:  AnswerValue,
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How strictly answers to choice questions are checked against the
/// question's declared options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicy {
  /// Choice answers must name declared options; `TEXT` answers must be
  /// scalars.
  #[default]
  Strict,
  /// Any well-formed value is stored verbatim.
  PassThrough,
}

impl AnswerPolicy {
  /// Check `value` as an answer to `question`.
  pub fn check(self, question: &Question, value: &AnswerValue) -> Result<()> {
    if self == Self::PassThrough {
      return Ok(());
    }

    let reject = |why: &str| -> Result<()> {
      Err(Error::validation(format!(
        "invalid answer for question {} ({:?}): {why}",
        question.question_id, question.title
      )))
    };
    let is_option = |s: &Scalar| {
      s.as_text().is_some_and(|t| question.options.iter().any(|o| o == t))
    };

    match (question.kind, value) {
      (QuestionType::Text, AnswerValue::Scalar(_)) => Ok(()),
      (QuestionType::Text, AnswerValue::List(_)) => {
        reject("TEXT answers must be a single value")
      }
      (QuestionType::Checkbox, AnswerValue::List(items)) => {
        if !items.iter().all(is_option) {
          return reject("every selection must be one of the declared options");
        }
        let mut seen = HashSet::with_capacity(items.len());
        if !items.iter().filter_map(Scalar::as_text).all(|t| seen.insert(t)) {
          return reject("an option may be selected at most once");
        }
        Ok(())
      }
      (QuestionType::Checkbox, AnswerValue::Scalar(_)) => {
        reject("CHECKBOX answers must be a list of options")
      }
      (_, AnswerValue::Scalar(s)) if is_option(s) => Ok(()),
      (_, AnswerValue::List(items)) if items.len() == 1 && is_option(&items[0]) => {
        Ok(())
      }
      _ => reject("value must be exactly one of the declared options"),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn question(kind: QuestionType, options: &[&str]) -> Question {
    Question {
      question_id: 7,
      survey_id:   "s".into(),
      title:       "Q".into(),
      kind,
      options:     options.iter().map(|o| o.to_string()).collect(),
    }
  }

  #[test]
  fn json_shapes_are_restricted() {
    assert!(AnswerValue::try_from(json!("yes")).is_ok());
    assert!(AnswerValue::try_from(json!(4.5)).is_ok());
    assert!(AnswerValue::try_from(json!(["a", 1, true])).is_ok());
    assert!(matches!(AnswerValue::try_from(Value::Null), Err(Error::Validation(_))));
    assert!(AnswerValue::try_from(json!({"a": 1})).is_err());
    assert!(AnswerValue::try_from(json!([["nested"]])).is_err());
    assert!(AnswerValue::try_from(json!(["a", null])).is_err());
  }

  #[test]
  fn value_serialises_verbatim() {
    let value: AnswerValue = serde_json::from_value(json!(["A", 2])).unwrap();
    assert_eq!(serde_json::to_value(&value).unwrap(), json!(["A", 2]));
    assert!(serde_json::from_value::<AnswerValue>(Value::Null).is_err());
  }

  #[test]
  fn buckets_branch_on_cardinality() {
    let list = AnswerValue::list(["A", "B"]);
    assert_eq!(list.buckets(Cardinality::Multi), vec!["A", "B"]);
    assert_eq!(list.buckets(Cardinality::Single), vec!["A"]);
    assert_eq!(AnswerValue::text("yes").buckets(Cardinality::Single), vec!["yes"]);
    assert_eq!(AnswerValue::text("yes").buckets(Cardinality::Multi), vec!["yes"]);
    assert!(AnswerValue::List(vec![]).buckets(Cardinality::Single).is_empty());

    let number: AnswerValue = serde_json::from_value(json!(3)).unwrap();
    assert_eq!(number.buckets(Cardinality::Single), vec!["3"]);
  }

  #[test]
  fn strict_policy_checks_options() {
    let strict = AnswerPolicy::Strict;
    let radio = question(QuestionType::MultipleChoice, &["yes", "no"]);
    assert!(strict.check(&radio, &AnswerValue::text("yes")).is_ok());
    assert!(strict.check(&radio, &AnswerValue::list(["no"])).is_ok());
    assert!(strict.check(&radio, &AnswerValue::text("maybe")).is_err());
    assert!(strict.check(&radio, &AnswerValue::list(["yes", "no"])).is_err());

    let boxes = question(QuestionType::Checkbox, &["A", "B", "C"]);
    assert!(strict.check(&boxes, &AnswerValue::list(["A", "C"])).is_ok());
    assert!(strict.check(&boxes, &AnswerValue::List(vec![])).is_ok());
    assert!(strict.check(&boxes, &AnswerValue::list(["A", "Z"])).is_err());
    assert!(strict.check(&boxes, &AnswerValue::list(["A", "A"])).is_err());
    assert!(strict.check(&boxes, &AnswerValue::list(["B", "C", "B"])).is_err());
    assert!(strict.check(&boxes, &AnswerValue::text("A")).is_err());

    let text = question(QuestionType::Text, &[]);
    assert!(strict.check(&text, &AnswerValue::text("anything")).is_ok());
    assert!(strict.check(&text, &AnswerValue::list(["a"])).is_err());
  }

  #[test]
  fn pass_through_policy_accepts_any_shape() {
    let policy = AnswerPolicy::PassThrough;
    let radio = question(QuestionType::Dropdown, &["yes", "no"]);
    assert!(policy.check(&radio, &AnswerValue::text("maybe")).is_ok());
    let boxes = question(QuestionType::Checkbox, &["A"]);
    assert!(policy.check(&boxes, &AnswerValue::text("Z")).is_ok());
  }
}
