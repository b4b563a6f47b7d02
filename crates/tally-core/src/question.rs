//! Questions and the rules that keep their options consistent with their
//! type.

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, survey::validate_title};

// ─── Type ────────────────────────────────────────────────────────────────────

/// How many values a single answer to a question may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
  Single,
  Multi,
}

/// The declared type of a question.
///
/// Parsing is case-insensitive; the canonical encoding is upper snake case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum QuestionType {
  Text,
  MultipleChoice,
  Dropdown,
  Checkbox,
}

impl QuestionType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Text => "TEXT",
      Self::MultipleChoice => "MULTIPLE_CHOICE",
      Self::Dropdown => "DROPDOWN",
      Self::Checkbox => "CHECKBOX",
    }
  }

  pub fn cardinality(self) -> Cardinality {
    match self {
      Self::Checkbox => Cardinality::Multi,
      Self::Text | Self::MultipleChoice | Self::Dropdown => Cardinality::Single,
    }
  }

  /// Choice types carry a declared list of options.
  pub fn is_choice(self) -> bool { !matches!(self, Self::Text) }
}

impl fmt::Display for QuestionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for QuestionType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_uppercase().as_str() {
      "TEXT" => Ok(Self::Text),
      "MULTIPLE_CHOICE" => Ok(Self::MultipleChoice),
      "DROPDOWN" => Ok(Self::Dropdown),
      "CHECKBOX" => Ok(Self::Checkbox),
      _ => Err(Error::validation(format!(
        "invalid question type {s:?}; must be one of TEXT, MULTIPLE_CHOICE, \
         DROPDOWN, CHECKBOX"
      ))),
    }
  }
}

impl TryFrom<String> for QuestionType {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

// ─── Question ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
  pub question_id: i64,
  pub survey_id:   String,
  pub title:       String,
  #[serde(rename = "type")]
  pub kind:        QuestionType,
  /// Ordered display options. Always empty for [`QuestionType::Text`].
  pub options:     Vec<String>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::SurveyStore::add_question`], and the inlined
/// question descriptor carried by external submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
  pub title:   String,
  #[serde(rename = "type")]
  pub kind:    QuestionType,
  #[serde(default)]
  pub options: Option<Vec<String>>,
}

impl NewQuestion {
  pub fn text(title: impl Into<String>) -> Self {
    Self { title: title.into(), kind: QuestionType::Text, options: None }
  }

  pub fn choice<I, T>(title: impl Into<String>, kind: QuestionType, options: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    Self {
      title: title.into(),
      kind,
      options: Some(options.into_iter().map(Into::into).collect()),
    }
  }

  /// Validate the descriptor, returning the options to persist.
  pub fn validate(&self) -> Result<Vec<String>> {
    validate_title("question title", &self.title)?;
    validate_options(self.kind, self.options.as_deref())
  }
}

/// A partial update to a question. `options: Some(None)` clears the options.
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
  pub title:   Option<String>,
  pub kind:    Option<QuestionType>,
  pub options: Option<Option<Vec<String>>>,
}

impl QuestionPatch {
  /// Merge the patch over `current` and validate the result.
  ///
  /// Switching a question to `TEXT` without supplying options drops the old
  /// choice options rather than failing on them.
  pub fn apply(self, current: &Question) -> Result<Question> {
    let title = self.title.unwrap_or_else(|| current.title.clone());
    let kind = self.kind.unwrap_or(current.kind);

    let options = match self.options {
      Some(opts) => opts,
      None if kind == QuestionType::Text => None,
      None => Some(current.options.clone()),
    };

    validate_title("question title", &title)?;
    let options = validate_options(kind, options.as_deref())?;

    Ok(Question {
      question_id: current.question_id,
      survey_id: current.survey_id.clone(),
      title,
      kind,
      options,
    })
  }
}

/// `TEXT` questions take no options; choice questions need a non-empty list
/// of distinct, non-blank options.
pub fn validate_options(
  kind: QuestionType,
  options: Option<&[String]>,
) -> Result<Vec<String>> {
  let options = options.unwrap_or_default();

  if !kind.is_choice() {
    if !options.is_empty() {
      return Err(Error::validation(
        "options must be null or empty for TEXT questions",
      ));
    }
    return Ok(Vec::new());
  }

  if options.is_empty() {
    return Err(Error::validation(format!(
      "a non-empty list of options is required for {kind} questions"
    )));
  }

  let mut seen = HashSet::with_capacity(options.len());
  for option in options {
    if option.trim().is_empty() {
      return Err(Error::validation("options must not be blank"));
    }
    if !seen.insert(option.as_str()) {
      return Err(Error::validation(format!("duplicate option {option:?}")));
    }
  }

  Ok(options.to_vec())
}
