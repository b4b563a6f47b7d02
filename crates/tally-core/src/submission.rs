//! Submissions and the two ingestion payloads that create them.
//!
//! A managed or public submission addresses questions by id. An external
//! (webhook) submission carries its own question descriptors and is resolved
//! against the survey by title, creating whatever is missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  answer::{Answer, AnswerValue},
  question::{NewQuestion, QuestionType},
  survey::validate_title,
};

// ─── Submission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
  pub submission_id: i64,
  pub survey_id:     String,
  pub submitted_at:  DateTime<Utc>,
}

/// A committed submission together with the answers written for it, in
/// payload order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
  pub submission: Submission,
  pub answers:    Vec<Answer>,
}

/// One answered question in a [`SubmissionDetail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  pub question_id: i64,
  pub question:    String,
  #[serde(rename = "type")]
  pub kind:        QuestionType,
  pub answer:      AnswerValue,
}

/// A submission resolved against its survey and questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionDetail {
  pub submission_id: i64,
  pub submitted_at:  DateTime<Utc>,
  pub survey_id:     String,
  pub survey_title:  String,
  pub responses:     Vec<Response>,
}

// ─── Managed / public ingestion ──────────────────────────────────────────────

/// Which entry point a by-id submission arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
  /// Authenticated; the survey may be in any status.
  Managed,
  /// Anonymous public form; only published surveys accept answers.
  Public,
}

/// One entry of a by-id submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerInput {
  pub question_id:  i64,
  pub answer_value: AnswerValue,
}

// ─── External ingestion ──────────────────────────────────────────────────────

/// Webhook payload. `questions[i]` describes the question answered by
/// `answers[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSubmission {
  #[serde(rename = "surveyId")]
  pub survey_id:    String,
  /// Needed only when the survey does not exist yet.
  #[serde(rename = "surveyTitle", default)]
  pub survey_title: Option<String>,
  pub questions:    Vec<NewQuestion>,
  pub answers:      Vec<AnswerValue>,
}

impl ExternalSubmission {
  /// Structural checks that need no store access.
  pub fn validate(&self) -> Result<()> {
    validate_title("surveyId", &self.survey_id)?;
    if let Some(title) = &self.survey_title {
      validate_title("surveyTitle", title)?;
    }
    if self.questions.len() != self.answers.len() {
      return Err(Error::validation(format!(
        "{} questions but {} answers; each answer needs a matching question",
        self.questions.len(),
        self.answers.len()
      )));
    }
    for question in &self.questions {
      validate_title("question title", &question.title)?;
    }
    Ok(())
  }

  /// Question descriptors paired positionally with their answers.
  pub fn pairs(&self) -> impl Iterator<Item = (&NewQuestion, &AnswerValue)> {
    self.questions.iter().zip(&self.answers)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn webhook_payload_deserialises() {
    let payload: ExternalSubmission = serde_json::from_value(json!({
      "surveyId": "ext-1",
      "surveyTitle": "Feedback",
      "questions": [
        { "title": "Name", "type": "TEXT" },
        { "title": "Tools", "type": "CHECKBOX", "options": ["A", "B"] }
      ],
      "answers": ["Ann", ["A"]]
    }))
    .unwrap();

    assert!(payload.validate().is_ok());
    let pairs: Vec<_> = payload.pairs().collect();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[1].0.kind, QuestionType::Checkbox);
    assert_eq!(*pairs[1].1, AnswerValue::list(["A"]));
  }

  #[test]
  fn mismatched_lengths_fail_validation() {
    let payload = ExternalSubmission {
      survey_id:    "ext-1".into(),
      survey_title: None,
      questions:    vec![NewQuestion::text("Name")],
      answers:      vec![],
    };
    assert!(matches!(payload.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn missing_survey_id_is_a_payload_error() {
    let parsed = serde_json::from_value::<ExternalSubmission>(json!({
      "questions": [],
      "answers": []
    }));
    assert!(parsed.is_err());

    let blank = ExternalSubmission {
      survey_id:    " ".into(),
      survey_title: None,
      questions:    vec![],
      answers:      vec![],
    };
    assert!(blank.validate().is_err());
  }
}
