//! Handlers for `/surveys` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/surveys` | Optional `?status=&is_external=&limit=&offset=`, newest first |
//! | `POST`   | `/surveys` | Body: `{"survey_title":"…","status"?,"publish_date"?,"survey_id"?}` |
//! | `GET`    | `/surveys/{id}` | Survey with its questions |
//! | `PUT`    | `/surveys/{id}` | Partial update; `"publish_date": null` clears it |
//! | `DELETE` | `/surveys/{id}` | Cascades to questions, submissions, answers |
//! | `PATCH`  | `/surveys/{id}/publish` | DRAFT → PUBLISHED |
//! | `PATCH`  | `/surveys/{id}/draft` | → DRAFT, clears the publish date |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tally_core::{
  question::Question,
  store::SurveyStore,
  survey::{NewSurvey, Survey, SurveyPatch, SurveyQuery, SurveyStatus},
};

use crate::{
  error::ApiError,
  extract::{Params, PathParam, Payload, double_option},
};

/// A survey together with its questions in creation order.
#[derive(Debug, Serialize)]
pub struct SurveyDetail {
  #[serde(flatten)]
  pub survey:    Survey,
  pub questions: Vec<Question>,
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status:      Option<SurveyStatus>,
  pub is_external: Option<bool>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SurveyList {
  pub surveys: Vec<Survey>,
  pub count:   usize,
}

/// `GET /surveys`
pub async fn list<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Params(params): Params<ListParams>,
) -> Result<Json<SurveyList>, ApiError> {
  let query = SurveyQuery {
    status:      params.status,
    is_external: params.is_external,
    limit:       params.limit,
    offset:      params.offset,
  };
  let surveys = store.list_surveys(&query).await.map_err(ApiError::from_store)?;
  Ok(Json(SurveyList { count: surveys.len(), surveys }))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub survey_id:    Option<String>,
  pub survey_title: String,
  pub status:       Option<SurveyStatus>,
  pub publish_date: Option<DateTime<Utc>>,
}

/// `POST /surveys`
pub async fn create<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Payload(body): Payload<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewSurvey {
    survey_id:  body.survey_id,
    title:      body.survey_title,
    status:     body.status,
    publish_at: body.publish_date,
  };
  let survey = store.create_survey(input).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(survey)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// Load a survey and its questions, or `NotFound`.
pub(crate) async fn load_detail<S: SurveyStore>(
  store: &S,
  id: &str,
) -> Result<SurveyDetail, ApiError> {
  let survey = store
    .get_survey(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("survey {id} not found")))?;
  let questions = store.list_questions(id).await.map_err(ApiError::from_store)?;
  Ok(SurveyDetail { survey, questions })
}

/// `GET /surveys/{id}`
pub async fn get_one<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
) -> Result<Json<SurveyDetail>, ApiError> {
  Ok(Json(load_detail(store.as_ref(), &id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub survey_title: Option<String>,
  pub status:       Option<SurveyStatus>,
  #[serde(default, deserialize_with = "double_option")]
  pub publish_date: Option<Option<DateTime<Utc>>>,
}

/// `PUT /surveys/{id}`
pub async fn update<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
  Payload(body): Payload<UpdateBody>,
) -> Result<Json<Survey>, ApiError> {
  let patch = SurveyPatch {
    title:      body.survey_title,
    status:     body.status,
    publish_at: body.publish_date,
  };
  let survey = store.update_survey(&id, patch).await.map_err(ApiError::from_store)?;
  Ok(Json(survey))
}

/// `PATCH /surveys/{id}/publish`
pub async fn publish<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
) -> Result<Json<Survey>, ApiError> {
  let survey = store
    .update_survey(&id, SurveyPatch::publish())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(survey))
}

/// `PATCH /surveys/{id}/draft`
pub async fn draft<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
) -> Result<Json<Survey>, ApiError> {
  let survey = store
    .update_survey(&id, SurveyPatch::draft())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(survey))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /surveys/{id}`
pub async fn delete<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
) -> Result<Json<Value>, ApiError> {
  store.delete_survey(&id).await.map_err(ApiError::from_store)?;
  Ok(Json(json!({ "status": "success", "message": "Survey deleted successfully" })))
}
