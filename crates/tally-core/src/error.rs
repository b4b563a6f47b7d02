//! Error types for `tally-core`.
//!
//! This is the caller-facing taxonomy. Storage backends fold their own
//! failures into [`Error::Persistence`] so that boundary adapters never see
//! backend internals.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed, missing, or inconsistent input. Fixable by the caller.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  /// Duplicate identity on create.
  #[error("conflict: {0}")]
  Conflict(String),

  /// A management-path mutation was attempted on an externally-sourced
  /// survey.
  #[error("survey {0} is external and cannot be modified")]
  ExternalSurvey(String),

  /// The store failed mid-operation. The transaction has been rolled back.
  #[error("persistence failure: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
