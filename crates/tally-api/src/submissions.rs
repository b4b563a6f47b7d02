//! Handlers for managed submission endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/surveys/{id}/submissions` | Newest first |
//! | `POST`   | `/surveys/{id}/submissions` | Body: `[{"question_id":1,"answer_value":…}]`, any status |
//! | `GET`    | `/submissions/{id}` | Answers resolved against their questions |
//! | `DELETE` | `/submissions/{id}` | Removes the submission's answers |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};
use tally_core::{
  store::SurveyStore,
  submission::{AnswerInput, Submission, SubmissionDetail, SubmissionReceipt, SubmitMode},
};

use crate::{
  error::ApiError,
  extract::{PathParam, Payload},
};

#[derive(Debug, Serialize)]
pub struct SubmissionList {
  pub submissions: Vec<Submission>,
  pub count:       usize,
}

/// `GET /surveys/{id}/submissions`
pub async fn list<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(survey_id): PathParam<String>,
) -> Result<Json<SubmissionList>, ApiError> {
  let submissions = store
    .list_submissions(&survey_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(SubmissionList { count: submissions.len(), submissions }))
}

/// The body shared by every successful ingestion endpoint.
pub(crate) fn created(receipt: &SubmissionReceipt) -> (StatusCode, Json<Value>) {
  (
    StatusCode::CREATED,
    Json(json!({
      "status": "success",
      "submission_id": receipt.submission.submission_id,
    })),
  )
}

/// `POST /surveys/{id}/submissions`
pub async fn create<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(survey_id): PathParam<String>,
  Payload(answers): Payload<Vec<AnswerInput>>,
) -> Result<impl IntoResponse, ApiError> {
  let receipt = store
    .submit(&survey_id, answers, SubmitMode::Managed)
    .await
    .map_err(ApiError::from_store)?;
  Ok(created(&receipt))
}

/// `GET /submissions/{id}`
pub async fn get_one<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<i64>,
) -> Result<Json<SubmissionDetail>, ApiError> {
  let detail = store
    .get_submission(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("submission {id} not found")))?;
  Ok(Json(detail))
}

/// `DELETE /submissions/{id}`
pub async fn delete<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<i64>,
) -> Result<Json<Value>, ApiError> {
  store.delete_submission(id).await.map_err(ApiError::from_store)?;
  Ok(Json(json!({ "status": "success", "message": "Submission deleted successfully" })))
}
