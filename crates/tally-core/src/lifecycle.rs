//! Survey status lifecycle.
//!
//! ```text
//!   DRAFT ⇄ PUBLISHED          explicit toggle
//!   DRAFT | PUBLISHED → SCHEDULED   requires a future publish date
//!   SCHEDULED → DRAFT          clears the publish date
//!   SCHEDULED → PUBLISHED      publish tick only
//! ```
//!
//! External surveys are outside the lifecycle: every management mutation is
//! refused with [`Error::ExternalSurvey`].

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  store::SurveyStore,
  survey::{NewSurvey, Survey, SurveyPatch, SurveyStatus, validate_title},
};

impl SurveyStatus {
  /// Whether a management edit may move a survey from `self` to `target`.
  /// Staying put is always allowed.
  pub fn can_edit_to(self, target: Self) -> bool {
    use SurveyStatus::*;
    match (self, target) {
      (Scheduled, Published) => false,
      _ => true,
    }
  }
}

/// Refuse management mutation of externally-sourced surveys.
pub fn ensure_mutable(survey: &Survey) -> Result<()> {
  if survey.is_external {
    return Err(Error::ExternalSurvey(survey.survey_id.clone()));
  }
  Ok(())
}

fn ensure_future(publish_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
  let at = publish_at.ok_or_else(|| {
    Error::validation("publish_date is required for scheduled surveys")
  })?;
  if at <= now {
    return Err(Error::validation(
      "publish_date for scheduled surveys must be in the future",
    ));
  }
  Ok(at)
}

/// Validate a new survey and resolve its initial status and publish date.
pub fn initial_state(
  input: &NewSurvey,
  now: DateTime<Utc>,
) -> Result<(SurveyStatus, Option<DateTime<Utc>>)> {
  validate_title("survey_title", &input.title)?;
  if let Some(id) = &input.survey_id {
    validate_title("survey_id", id)?;
  }

  match input.status.unwrap_or(SurveyStatus::Draft) {
    SurveyStatus::Scheduled => {
      let at = ensure_future(input.publish_at, now)?;
      Ok((SurveyStatus::Scheduled, Some(at)))
    }
    status if input.publish_at.is_some() => Err(Error::validation(format!(
      "publish_date is only accepted for scheduled surveys, not {status}"
    ))),
    status => Ok((status, None)),
  }
}

/// Apply a management edit to `survey` in place.
///
/// The future-date rule is enforced whenever the patch touches status or
/// publish date and the outcome is `SCHEDULED`; a title-only edit of a
/// scheduled survey whose date has just passed is still accepted, leaving the
/// promotion to the next tick.
pub fn apply_patch(survey: &mut Survey, patch: SurveyPatch, now: DateTime<Utc>) -> Result<()> {
  ensure_mutable(survey)?;

  if let Some(title) = &patch.title {
    validate_title("survey_title", title)?;
  }

  if patch.touches_lifecycle() {
    let target = patch.status.unwrap_or(survey.status);
    if !survey.status.can_edit_to(target) {
      return Err(Error::validation(format!(
        "cannot move a {} survey to {target}; scheduled surveys are published \
         automatically at their publish date",
        survey.status
      )));
    }

    let publish_at = match target {
      SurveyStatus::Scheduled => {
        let requested = patch.publish_at.unwrap_or(survey.publish_at);
        Some(ensure_future(requested, now)?)
      }
      _ if matches!(patch.publish_at, Some(Some(_))) => {
        return Err(Error::validation(format!(
          "publish_date is only accepted for scheduled surveys, not {target}"
        )));
      }
      SurveyStatus::Draft | SurveyStatus::Published => None,
    };

    survey.status = target;
    survey.publish_at = publish_at;
  }

  if let Some(title) = patch.title {
    survey.title = title;
  }
  Ok(())
}

/// Whether the publish tick should promote `survey` at `now`.
pub fn is_due(survey: &Survey, now: DateTime<Utc>) -> bool {
  survey.status == SurveyStatus::Scheduled
    && survey.publish_at.is_some_and(|at| at <= now)
}

/// Tick transition for one survey: SCHEDULED → PUBLISHED once due. The
/// publish date is left in place. Returns whether anything changed.
pub fn promote_if_due(survey: &mut Survey, now: DateTime<Utc>) -> bool {
  if !is_due(survey, now) {
    return false;
  }
  survey.status = SurveyStatus::Published;
  true
}

/// One publish tick: promote every due survey in a single store transaction.
///
/// Failures are logged and swallowed. The transaction has rolled back, so the
/// same surveys are still due and the next tick retries them. Returns the
/// number of surveys published.
pub async fn run_publish_tick<S: SurveyStore>(store: &S, now: DateTime<Utc>) -> usize {
  match store.publish_due(now).await {
    Ok(published) => {
      for survey in &published {
        tracing::info!(
          survey_id = %survey.survey_id,
          title = %survey.title,
          "published scheduled survey"
        );
      }
      if published.is_empty() {
        tracing::debug!("no scheduled surveys due");
      }
      published.len()
    }
    Err(e) => {
      let e: Error = e.into();
      tracing::error!(error = %e, "publish tick failed; retrying next interval");
      0
    }
  }
}
