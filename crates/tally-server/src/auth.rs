//! HTTP Basic authentication against the `users` table.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;
use tally_core::store::SurveyStore;

use crate::{AppState, error::Error};

/// Hash `password` into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, Error> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::Hash(e.to_string()))
}

/// Check `password` against a stored PHC string. A malformed hash never
/// verifies.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// Pull `(username, password)` out of an `Authorization: Basic …` header.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded.trim()).map_err(|_| Error::Unauthorized)?;
  let creds   = String::from_utf8(decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Middleware guarding the management routes.
pub async fn require_auth<S>(
  State(state): State<AppState<S>>,
  request: Request,
  next: Next,
) -> Result<Response, Error>
where
  S: SurveyStore + 'static,
{
  let (username, password) = basic_credentials(request.headers())?;

  let user = state
    .store
    .find_user(&username)
    .await
    .map_err(Error::from_store)?;

  match user {
    Some(user) if verify_password(&password, &user.password_hash) => {
      Ok(next.run(request).await)
    }
    _ => {
      tracing::debug!(%username, "rejected credentials");
      Err(Error::Unauthorized)
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::http::{HeaderValue, header};

  use super::*;

  fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn hashed_password_verifies() {
    let hash = hash_password("hunter2").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("hunter2", &hash));
    assert!(!verify_password("hunter3", &hash));
  }

  #[test]
  fn garbage_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
  }

  #[test]
  fn credentials_are_split_on_first_colon() {
    let (user, pass) = basic_credentials(&headers_with(&basic("alice", "a:b"))).unwrap();
    assert_eq!(user, "alice");
    assert_eq!(pass, "a:b");
  }

  #[test]
  fn missing_or_malformed_header_is_unauthorized() {
    assert!(matches!(basic_credentials(&HeaderMap::new()), Err(Error::Unauthorized)));
    assert!(matches!(
      basic_credentials(&headers_with("Bearer abc")),
      Err(Error::Unauthorized)
    ));
    assert!(matches!(
      basic_credentials(&headers_with("Basic !!!not-base64")),
      Err(Error::Unauthorized)
    ));
    let no_colon = format!("Basic {}", B64.encode("alice"));
    assert!(matches!(basic_credentials(&headers_with(&no_colon)), Err(Error::Unauthorized)));
  }
}
