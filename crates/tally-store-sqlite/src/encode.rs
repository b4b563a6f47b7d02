//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that string comparison in SQL matches
//! chronological order. Question options and answer values are stored as
//! compact JSON.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use rusqlite::Row;
use tally_core::{
  answer::{Answer, AnswerValue},
  question::{Question, QuestionType},
  submission::Submission,
  survey::{Survey, SurveyStatus},
  user::User,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Round `dt` down to storage precision, so a freshly returned row compares
/// equal to the same row read back.
pub fn truncate_dt(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn stored_now() -> DateTime<Utc> { truncate_dt(Utc::now()) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<SurveyStatus> {
  s.parse().map_err(|_| Error::Corrupt { column: "surveys.status", value: s.to_owned() })
}

pub fn decode_question_type(s: &str) -> Result<QuestionType> {
  s.parse().map_err(|_| Error::Corrupt { column: "questions.kind", value: s.to_owned() })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_options(options: &[String]) -> Result<String> {
  Ok(serde_json::to_string(options)?)
}

pub fn decode_options(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

pub fn encode_answer(value: &AnswerValue) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_answer(s: &str) -> Result<AnswerValue> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SURVEY_COLUMNS: &str =
  "survey_id, title, created_at, status, publish_at, is_external";

/// Raw values read directly from a `surveys` row.
pub struct RawSurvey {
  pub survey_id:   String,
  pub title:       String,
  pub created_at:  String,
  pub status:      String,
  pub publish_at:  Option<String>,
  pub is_external: bool,
}

impl RawSurvey {
  /// Expects the columns in [`SURVEY_COLUMNS`] order.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      survey_id:   row.get(0)?,
      title:       row.get(1)?,
      created_at:  row.get(2)?,
      status:      row.get(3)?,
      publish_at:  row.get(4)?,
      is_external: row.get(5)?,
    })
  }

  pub fn into_survey(self) -> Result<Survey> {
    Ok(Survey {
      survey_id:   self.survey_id,
      title:       self.title,
      created_at:  decode_dt(&self.created_at)?,
      status:      decode_status(&self.status)?,
      publish_at:  self.publish_at.as_deref().map(decode_dt).transpose()?,
      is_external: self.is_external,
    })
  }
}

pub const QUESTION_COLUMNS: &str = "question_id, survey_id, title, kind, options_json";

/// Raw values read directly from a `questions` row.
pub struct RawQuestion {
  pub question_id:  i64,
  pub survey_id:    String,
  pub title:        String,
  pub kind:         String,
  pub options_json: String,
}

impl RawQuestion {
  /// Expects the columns in [`QUESTION_COLUMNS`] order.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      question_id:  row.get(0)?,
      survey_id:    row.get(1)?,
      title:        row.get(2)?,
      kind:         row.get(3)?,
      options_json: row.get(4)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      question_id: self.question_id,
      survey_id:   self.survey_id,
      title:       self.title,
      kind:        decode_question_type(&self.kind)?,
      options:     decode_options(&self.options_json)?,
    })
  }
}

/// Raw values read directly from a `submissions` row.
pub struct RawSubmission {
  pub submission_id: i64,
  pub survey_id:     String,
  pub submitted_at:  String,
}

impl RawSubmission {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id: row.get(0)?,
      survey_id:     row.get(1)?,
      submitted_at:  row.get(2)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    Ok(Submission {
      submission_id: self.submission_id,
      survey_id:     self.survey_id,
      submitted_at:  decode_dt(&self.submitted_at)?,
    })
  }
}

/// Raw values read directly from an `answers` row.
pub struct RawAnswer {
  pub answer_id:     i64,
  pub submission_id: i64,
  pub question_id:   i64,
  pub value_json:    String,
}

impl RawAnswer {
  pub fn into_answer(self) -> Result<Answer> {
    Ok(Answer {
      answer_id:     self.answer_id,
      submission_id: self.submission_id,
      question_id:   self.question_id,
      answer_value:  decode_answer(&self.value_json)?,
    })
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:       i64,
  pub username:      String,
  pub password_hash: String,
}

impl RawUser {
  pub fn into_user(self) -> User {
    User {
      user_id:       self.user_id,
      username:      self.username,
      password_hash: self.password_hash,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let fraction = whole + Duration::microseconds(1);
    let later = whole + Duration::seconds(1);

    let (a, b, c) = (encode_dt(whole), encode_dt(fraction), encode_dt(later));
    assert_eq!(a.len(), b.len());
    assert!(a < b && b < c);
    assert_eq!(decode_dt(&b).unwrap(), fraction);
  }

  #[test]
  fn unknown_status_is_corrupt_not_validation() {
    assert!(matches!(decode_status("archived"), Err(Error::Corrupt { .. })));
    assert_eq!(decode_status("scheduled").unwrap(), SurveyStatus::Scheduled);
  }
}
