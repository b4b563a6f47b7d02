//! Management-API users.
//!
//! Only the password hash is ever stored. Hashing and verification belong to
//! the authentication layer; this crate just carries the PHC string.

use serde::Serialize;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct User {
  pub user_id:       i64,
  pub username:      String,
  /// Salted one-way hash (PHC string). Never serialised.
  #[serde(skip)]
  pub password_hash: String,
}

/// Usernames are non-blank and free of `:`, which would break HTTP Basic
/// credentials.
pub fn validate_username(username: &str) -> Result<()> {
  if username.trim().is_empty() {
    return Err(Error::validation("username is required"));
  }
  if username.contains(':') {
    return Err(Error::validation("username must not contain ':'"));
  }
  Ok(())
}
