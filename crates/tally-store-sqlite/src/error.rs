//! Error type for `tally-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule rejected the operation. Passed through to callers as-is.
  #[error(transparent)]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value outside its domain.
  #[error("corrupt column {column}: {value:?}")]
  Corrupt { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for tally_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(e) => e,
      other => tally_core::Error::Persistence(Box::new(other)),
    }
  }
}
