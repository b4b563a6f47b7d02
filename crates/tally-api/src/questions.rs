//! Handlers for question endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/surveys/{id}/questions` | Body: `{"question_title","question_type","options"?}` |
//! | `PUT`    | `/questions/{id}` | Partial update; `"options": null` clears them |
//! | `DELETE` | `/questions/{id}` | Also removes every answer to the question |
//!
//! All three are refused with 403 for external surveys.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tally_core::{
  question::{NewQuestion, Question, QuestionPatch, QuestionType},
  store::SurveyStore,
};

use crate::{
  error::ApiError,
  extract::{PathParam, Payload, double_option},
};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(alias = "title")]
  pub question_title: String,
  #[serde(alias = "type")]
  pub question_type:  QuestionType,
  #[serde(default)]
  pub options:        Option<Vec<String>>,
}

/// `POST /surveys/{id}/questions`
pub async fn create<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(survey_id): PathParam<String>,
  Payload(body): Payload<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewQuestion {
    title:   body.question_title,
    kind:    body.question_type,
    options: body.options,
  };
  let question = store
    .add_question(&survey_id, input)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(question)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  #[serde(alias = "title")]
  pub question_title: Option<String>,
  #[serde(alias = "type")]
  pub question_type:  Option<QuestionType>,
  #[serde(default, deserialize_with = "double_option")]
  pub options:        Option<Option<Vec<String>>>,
}

/// `PUT /questions/{id}`
pub async fn update<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<i64>,
  Payload(body): Payload<UpdateBody>,
) -> Result<Json<Question>, ApiError> {
  let patch = QuestionPatch {
    title:   body.question_title,
    kind:    body.question_type,
    options: body.options,
  };
  let question = store.update_question(id, patch).await.map_err(ApiError::from_store)?;
  Ok(Json(question))
}

/// `DELETE /questions/{id}`
pub async fn delete<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<i64>,
) -> Result<Json<Value>, ApiError> {
  store.delete_question(id).await.map_err(ApiError::from_store)?;
  Ok(Json(json!({ "status": "success", "message": "Question deleted successfully" })))
}
