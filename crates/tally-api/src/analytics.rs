//! `GET /surveys/{id}/analytics`: per-question answer frequencies.

use std::sync::Arc;

use axum::{Json, extract::State};
use tally_core::{
  analytics::{SurveyAnalytics, compute_analytics},
  store::SurveyStore,
};

use crate::{error::ApiError, extract::PathParam};

pub async fn handler<S: SurveyStore>(
  State(store): State<Arc<S>>,
  PathParam(id): PathParam<String>,
) -> Result<Json<SurveyAnalytics>, ApiError> {
  Ok(Json(compute_analytics(store.as_ref(), &id).await?))
}
