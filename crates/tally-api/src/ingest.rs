//! Unauthenticated ingestion endpoints: the external webhook and the public
//! survey form.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/webhook` | Body: `{"surveyId","surveyTitle"?,"questions":[…],"answers":[…]}` |
//! | `GET`  | `/public/surveys/{id}` | 404 unless the survey is published |
//! | `POST` | `/public/surveys/{id}/submit` | Body: `[{"question_id","answer_value"}]`, published only |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  response::IntoResponse,
};
use tally_core::{
  store::SurveyStore,
  submission::{AnswerInput, ExternalSubmission, SubmitMode},
  survey::SurveyStatus,
};

use crate::{
  error::ApiError,
  extract::{PathParam, Payload},
  submissions::created,
  surveys::{SurveyDetail, load_detail},
};

/// `POST /webhook`
///
/// Resolves or creates the survey and its questions by title, then records
/// the submission. Either everything is written or nothing is.
pub async fn webhook<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Payload(payload): Payload<ExternalSubmission>,
) -> Result<impl IntoResponse, ApiError> {
  let survey_id = payload.survey_id.clone();
  let receipt = store.ingest_external(payload).await.map_err(|e| {
    let e = ApiError::from_store(e);
    tracing::warn!(%survey_id, error = %e, "webhook submission rejected");
    e
  })?;
  Ok(created(&receipt))
}

/// `GET /public/surveys/{id}`
pub async fn survey<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
) -> Result<Json<SurveyDetail>, ApiError> {
  let detail = load_detail(store.as_ref(), &id).await?;
  if detail.survey.status != SurveyStatus::Published {
    return Err(ApiError::NotFound(format!("survey {id} is not available")));
  }
  Ok(Json(detail))
}

/// `POST /public/surveys/{id}/submit`
pub async fn submit<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
  Payload(answers): Payload<Vec<AnswerInput>>,
) -> Result<impl IntoResponse, ApiError> {
  let receipt = store
    .submit(&id, answers, SubmitMode::Public)
    .await
    .map_err(ApiError::from_store)?;
  Ok(created(&receipt))
}
