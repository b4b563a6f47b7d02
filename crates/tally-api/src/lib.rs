//! JSON REST API for Tally.
//!
//! Exposes axum [`Router`]s backed by any [`tally_core::store::SurveyStore`].
//! Authentication, TLS, and transport concerns are the caller's
//! responsibility: mount [`management_router`] behind an auth layer and
//! [`public_router`] without one.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .merge(tally_api::public_router(store.clone()))
//!   .merge(tally_api::management_router(store).route_layer(auth))
//! ```

pub mod analytics;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod questions;
pub mod submissions;
pub mod surveys;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use tally_core::store::SurveyStore;

pub use error::ApiError;

/// Routes that require an authenticated caller.
///
/// The returned `Router<()>` can be merged into any parent router regardless
/// of its own state type.
pub fn management_router<S>(store: Arc<S>) -> Router<()>
where
  S: SurveyStore + 'static,
{
  Router::new()
    // Surveys
    .route("/surveys", get(surveys::list::<S>).post(surveys::create::<S>))
    .route(
      "/surveys/{id}",
      get(surveys::get_one::<S>).put(surveys::update::<S>).delete(surveys::delete::<S>),
    )
    .route("/surveys/{id}/publish", patch(surveys::publish::<S>))
    .route("/surveys/{id}/draft", patch(surveys::draft::<S>))
    // Questions
    .route("/surveys/{id}/questions", post(questions::create::<S>))
    .route("/questions/{id}", put(questions::update::<S>).delete(questions::delete::<S>))
    // Submissions
    .route(
      "/surveys/{id}/submissions",
      get(submissions::list::<S>).post(submissions::create::<S>),
    )
    .route(
      "/submissions/{id}",
      get(submissions::get_one::<S>).delete(submissions::delete::<S>),
    )
    // Analytics
    .route("/surveys/{id}/analytics", get(analytics::handler::<S>))
    .with_state(store)
}

/// Routes open to anyone: the webhook and the public survey form.
pub fn public_router<S>(store: Arc<S>) -> Router<()>
where
  S: SurveyStore + 'static,
{
  Router::new()
    .route("/webhook", post(ingest::webhook::<S>))
    .route("/public/surveys/{id}", get(ingest::survey::<S>))
    .route("/public/surveys/{id}/submit", post(ingest::submit::<S>))
    .with_state(store)
}
