//! HTTP host for Tally.
//!
//! Wires the [`tally_api`] routers to a concrete store, guards the management
//! routes with Basic auth against the `users` table, and adds the two
//! host-level endpoints the API crate leaves out: account registration and
//! the database health check.

pub mod auth;
pub mod error;
pub mod scheduler;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Json, Router,
  extract::State,
  http::StatusCode,
  middleware,
  response::IntoResponse,
  routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tally_api::{ApiError, extract::Payload};
use tally_core::{answer::AnswerPolicy, store::SurveyStore};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TALLY_*` environment variables. Every key is optional.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  pub answer_policy:         AnswerPolicy,
  pub publish_interval_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "127.0.0.1".to_string(),
      port:                  5000,
      store_path:            PathBuf::from("tally.db"),
      answer_policy:         AnswerPolicy::Strict,
      publish_interval_secs: 300,
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn publish_interval(&self) -> Duration {
    Duration::from_secs(self.publish_interval_secs)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the host-level handlers and the auth layer.
pub struct AppState<S> {
  pub store: Arc<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SurveyStore + 'static,
{
  let auth = middleware::from_fn_with_state(state.clone(), auth::require_auth::<S>);

  Router::new()
    .route("/register", post(register::<S>))
    .route("/check-db-connection", get(check_db_connection::<S>))
    .with_state(state.clone())
    .merge(tally_api::public_router(state.store.clone()))
    .merge(tally_api::management_router(state.store).route_layer(auth))
    .layer(TraceLayer::new_for_http())
}

// ─── Host-level handlers ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username: String,
  pub password: String,
}

/// `POST /register`
async fn register<S: SurveyStore>(
  State(state): State<AppState<S>>,
  Payload(body): Payload<RegisterBody>,
) -> Result<impl IntoResponse, Error> {
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password is required".into()).into());
  }
  let hash = auth::hash_password(&body.password)?;
  let user = state
    .store
    .create_user(body.username, hash)
    .await
    .map_err(Error::from_store)?;

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "status": "success",
      "user_id": user.user_id,
      "username": user.username,
    })),
  ))
}

/// `GET /check-db-connection`
async fn check_db_connection<S: SurveyStore>(
  State(state): State<AppState<S>>,
) -> impl IntoResponse {
  health_response(state.store.ping().await)
}

/// 200 when the store answered, 503 when it did not.
fn health_response<E: std::fmt::Display>(
  ping: Result<(), E>,
) -> (StatusCode, Json<serde_json::Value>) {
  match ping {
    Ok(()) => (
      StatusCode::OK,
      Json(json!({ "status": "success", "message": "database connection is healthy" })),
    ),
    Err(e) => {
      tracing::error!(error = %e, "database health check failed");
      (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "error", "message": "database connection failed" })),
      )
    }
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use serde_json::Value;
  use tally_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let hash  = auth::hash_password(password).unwrap();
    store.create_user("admin".to_string(), hash).await.unwrap();

    AppState { store: Arc::new(store) }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    state:  &AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    auth:   Option<(&str, &str)>,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, pass)) = auth {
      builder = builder.header(header::AUTHORIZATION, auth_header(user, pass));
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    let resp = router(state.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes  = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value  = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  const ADMIN: Option<(&str, &str)> = Some(("admin", "secret"));

  // ── Host endpoints ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_check_reports_success() {
    let state = make_state("secret").await;
    let (status, body) = send(&state, "GET", "/check-db-connection", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
  }

  #[test]
  fn unreachable_database_is_service_unavailable() {
    let (status, Json(body)) = health_response(Err("connection refused"));
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");

    let (status, _) = health_response::<&str>(Ok(()));
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn register_then_authenticate() {
    let state = make_state("secret").await;
    let creds = json!({ "username": "bob", "password": "pw" });

    let (status, body) = send(&state, "POST", "/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "bob");
    assert!(body.get("password_hash").is_none());

    let (status, _) = send(&state, "POST", "/register", None, Some(creds)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&state, "GET", "/surveys", Some(("bob", "pw")), None).await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn register_rejects_blank_credentials() {
    let state = make_state("secret").await;
    let (status, _) = send(
      &state,
      "POST",
      "/register",
      None,
      Some(json!({ "username": "bob", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
      &state,
      "POST",
      "/register",
      None,
      Some(json!({ "username": "  ", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn management_routes_require_credentials() {
    let state = make_state("secret").await;

    let resp = router(state.clone())
      .oneshot(Request::get("/surveys").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
      "Basic realm=\"tally\""
    );

    let (status, _) = send(&state, "GET", "/surveys", Some(("admin", "wrong")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, "GET", "/surveys", Some(("nobody", "secret")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&state, "GET", "/surveys", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
  }

  // ── End to end ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn managed_survey_round_trip() {
    let state = make_state("secret").await;

    let (status, survey) = send(
      &state,
      "POST",
      "/surveys",
      ADMIN,
      Some(json!({ "survey_title": "Lunch" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(survey["status"], "draft");
    let id = survey["survey_id"].as_str().unwrap().to_owned();

    let (status, question) = send(
      &state,
      "POST",
      &format!("/surveys/{id}/questions"),
      ADMIN,
      Some(json!({
        "question_title": "Main",
        "question_type": "MULTIPLE_CHOICE",
        "options": ["Soup", "Salad"],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let qid = question["question_id"].as_i64().unwrap();

    // Drafts are invisible to the public form.
    let (status, _) = send(&state, "GET", &format!("/public/surveys/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, published) =
      send(&state, "PATCH", &format!("/surveys/{id}/publish"), ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");

    let (status, form) = send(&state, "GET", &format!("/public/surveys/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["questions"][0]["title"], "Main");

    for choice in ["Soup", "Soup", "Salad"] {
      let (status, receipt) = send(
        &state,
        "POST",
        &format!("/public/surveys/{id}/submit"),
        None,
        Some(json!([{ "question_id": qid, "answer_value": choice }])),
      )
      .await;
      assert_eq!(status, StatusCode::CREATED);
      assert_eq!(receipt["status"], "success");
    }

    let (status, report) =
      send(&state, "GET", &format!("/surveys/{id}/analytics"), ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total_submissions"], 3);
    assert_eq!(report["results"][0]["answer_frequencies"]["Soup"], 2);
    assert_eq!(report["results"][0]["answer_frequencies"]["Salad"], 1);

    let (status, list) =
      send(&state, "GET", &format!("/surveys/{id}/submissions"), ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 3);

    let (status, _) = send(&state, "DELETE", &format!("/surveys/{id}"), ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&state, "GET", &format!("/surveys/{id}"), ADMIN, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn webhook_survey_is_read_only_through_management() {
    let state = make_state("secret").await;

    let (status, _) = send(
      &state,
      "POST",
      "/webhook",
      None,
      Some(json!({
        "surveyId": "ext-1",
        "surveyTitle": "Imported",
        "questions": [{ "title": "Name", "type": "TEXT" }],
        "answers": ["Ada"],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, detail) = send(&state, "GET", "/surveys/ext-1", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["is_external"], true);
    assert_eq!(detail["questions"][0]["title"], "Name");

    let (status, _) = send(
      &state,
      "PUT",
      "/surveys/ext-1",
      ADMIN,
      Some(json!({ "survey_title": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
      &state,
      "POST",
      "/surveys/ext-1/questions",
      ADMIN,
      Some(json!({ "question_title": "Extra", "question_type": "TEXT" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn non_numeric_ids_get_a_json_error() {
    let state = make_state("secret").await;

    for (method, uri) in [
      ("DELETE", "/questions/abc"),
      ("GET", "/submissions/first"),
      ("DELETE", "/submissions/1.5"),
    ] {
      let (status, body) = send(&state, method, uri, ADMIN, None).await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
      assert!(body["error"].is_string(), "{method} {uri}: {body}");
    }

    let (status, body) = send(
      &state,
      "PUT",
      "/questions/abc",
      ADMIN,
      Some(json!({ "question_title": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn malformed_json_is_a_bad_request() {
    let state = make_state("secret").await;
    let req = Request::post("/webhook")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from("{not json"))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn config_defaults_fill_missing_keys() {
    let cfg: ServerConfig = serde_json::from_value(json!({ "port": 8080 })).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.store_path, PathBuf::from("tally.db"));
    assert_eq!(cfg.answer_policy, AnswerPolicy::Strict);
    assert_eq!(cfg.publish_interval(), Duration::from_secs(300));

    let cfg: ServerConfig =
      serde_json::from_value(json!({ "answer_policy": "pass_through" })).unwrap();
    assert_eq!(cfg.answer_policy, AnswerPolicy::PassThrough);
  }
}
