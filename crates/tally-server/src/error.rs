//! Server-level errors and their HTTP rendering.
//!
//! Everything the API crate can produce passes through unchanged; this type
//! only adds what the API crate leaves to its host: authentication and
//! password hashing.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use tally_api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("password hashing failed: {0}")]
  Hash(String),
  #[error(transparent)]
  Api(#[from] ApiError),
}

impl Error {
  pub fn from_store<E: Into<tally_core::Error>>(e: E) -> Self {
    Self::Api(ApiError::from_store(e))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" })))
            .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"tally\""),
        );
        res
      }
      Error::Hash(msg) => {
        tracing::error!(error = %msg, "password hashing failed");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(json!({ "error": "internal server error" })),
        )
          .into_response()
      }
      Error::Api(e) => e.into_response(),
    }
  }
}
