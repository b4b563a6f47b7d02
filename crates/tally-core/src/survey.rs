//! Surveys: the root of the survey → question → submission → answer graph.
//!
//! A survey owns its questions and submissions; deleting it removes both.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Publication status of a survey.
///
/// The lowercase names are the only accepted encoding, both on the wire and
/// in storage. Unknown values are rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
  Draft,
  Published,
  Scheduled,
}

impl SurveyStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Published => "published",
      Self::Scheduled => "scheduled",
    }
  }
}

impl fmt::Display for SurveyStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SurveyStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "draft" => Ok(Self::Draft),
      "published" => Ok(Self::Published),
      "scheduled" => Ok(Self::Scheduled),
      other => Err(Error::validation(format!(
        "invalid status {other:?}; must be one of draft, published, scheduled"
      ))),
    }
  }
}

// ─── Survey ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
  /// Opaque key; externally assigned for webhook-sourced surveys, otherwise
  /// a generated UUID string.
  pub survey_id:   String,
  #[serde(rename = "survey_title")]
  pub title:       String,
  pub created_at:  DateTime<Utc>,
  pub status:      SurveyStatus,
  /// Set while the survey is scheduled. Cleared by a manual publish; left in
  /// place when the publish tick promotes the survey.
  #[serde(rename = "publish_date")]
  pub publish_at:  Option<DateTime<Utc>>,
  /// True for surveys first materialised by the ingestion webhook.
  pub is_external: bool,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::SurveyStore::create_survey`].
#[derive(Debug, Clone, Default)]
pub struct NewSurvey {
  /// Caller-chosen id. A UUID is generated when absent.
  pub survey_id:  Option<String>,
  pub title:      String,
  /// Defaults to [`SurveyStatus::Draft`].
  pub status:     Option<SurveyStatus>,
  pub publish_at: Option<DateTime<Utc>>,
}

impl NewSurvey {
  pub fn draft(title: impl Into<String>) -> Self {
    Self { title: title.into(), ..Self::default() }
  }

  pub fn scheduled(title: impl Into<String>, publish_at: DateTime<Utc>) -> Self {
    Self {
      title: title.into(),
      status: Some(SurveyStatus::Scheduled),
      publish_at: Some(publish_at),
      ..Self::default()
    }
  }
}

/// A partial update to a survey. `None` leaves the field untouched;
/// `publish_at: Some(None)` clears the publish date.
#[derive(Debug, Clone, Default)]
pub struct SurveyPatch {
  pub title:      Option<String>,
  pub status:     Option<SurveyStatus>,
  pub publish_at: Option<Option<DateTime<Utc>>>,
}

impl SurveyPatch {
  pub fn publish() -> Self {
    Self { status: Some(SurveyStatus::Published), ..Self::default() }
  }

  pub fn draft() -> Self {
    Self { status: Some(SurveyStatus::Draft), ..Self::default() }
  }

  pub fn schedule(publish_at: DateTime<Utc>) -> Self {
    Self {
      status: Some(SurveyStatus::Scheduled),
      publish_at: Some(Some(publish_at)),
      ..Self::default()
    }
  }

  /// Whether this patch touches the lifecycle fields at all.
  pub fn touches_lifecycle(&self) -> bool {
    self.status.is_some() || self.publish_at.is_some()
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::SurveyStore::list_surveys`]. Results are
/// ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct SurveyQuery {
  pub status:      Option<SurveyStatus>,
  pub is_external: Option<bool>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// Reject blank titles. Titles are otherwise stored verbatim, since question
/// titles double as the matching key for external ingestion.
pub fn validate_title(what: &str, title: &str) -> crate::Result<()> {
  if title.trim().is_empty() {
    return Err(Error::validation(format!("{what} is required")));
  }
  Ok(())
}
