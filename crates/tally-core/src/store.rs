//! The `SurveyStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `tally-store-sqlite`).
//! Higher layers (`tally-api`, `tally-server`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  analytics::AnswerSheet,
  question::{NewQuestion, Question, QuestionPatch},
  submission::{
    AnswerInput, ExternalSubmission, Submission, SubmissionDetail, SubmissionReceipt,
    SubmitMode,
  },
  survey::{NewSurvey, Survey, SurveyPatch, SurveyQuery},
  user::User,
};

/// Abstraction over a Tally survey store backend.
///
/// Every method is one atomic unit: it either commits all of its writes or
/// none of them. Validation failures are reported through `Self::Error` and
/// surface as [`crate::Error`] after conversion, so callers can match on the
/// domain taxonomy without knowing the backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SurveyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Surveys ───────────────────────────────────────────────────────────

  /// Validate and persist a new survey. `created_at` is set by the store.
  ///
  /// Returns a conflict if a caller-supplied id is already taken.
  fn create_survey(
    &self,
    input: NewSurvey,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  /// Retrieve a survey by id. Returns `None` if not found.
  fn get_survey<'a>(
    &'a self,
    survey_id: &'a str,
  ) -> impl Future<Output = Result<Option<Survey>, Self::Error>> + Send + 'a;

  /// List surveys matching `query`, newest first.
  fn list_surveys<'a>(
    &'a self,
    query: &'a SurveyQuery,
  ) -> impl Future<Output = Result<Vec<Survey>, Self::Error>> + Send + 'a;

  /// Apply a management edit under the lifecycle rules in
  /// [`crate::lifecycle::apply_patch`].
  fn update_survey<'a>(
    &'a self,
    survey_id: &'a str,
    patch: SurveyPatch,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + 'a;

  /// Delete a survey together with its questions, submissions, and answers.
  fn delete_survey<'a>(
    &'a self,
    survey_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Questions ─────────────────────────────────────────────────────────

  /// Add a question to a non-external survey.
  fn add_question<'a>(
    &'a self,
    survey_id: &'a str,
    input: NewQuestion,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + 'a;

  fn get_question(
    &self,
    question_id: i64,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + '_;

  /// Questions of a survey in creation order.
  fn list_questions<'a>(
    &'a self,
    survey_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + 'a;

  /// Look a question up by its exact title within a survey.
  fn find_question<'a>(
    &'a self,
    survey_id: &'a str,
    title: &'a str,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + 'a;

  fn update_question(
    &self,
    question_id: i64,
    patch: QuestionPatch,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  /// Delete a question and every answer given to it.
  fn delete_question(
    &self,
    question_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Record a by-id submission. Each answer must address a question of
  /// `survey_id` and pass the store's answer policy.
  fn submit<'a>(
    &'a self,
    survey_id: &'a str,
    answers: Vec<AnswerInput>,
    mode: SubmitMode,
  ) -> impl Future<Output = Result<SubmissionReceipt, Self::Error>> + Send + 'a;

  /// Resolve-or-create the survey and its questions from a webhook payload,
  /// then record the submission, all in one transaction.
  fn ingest_external(
    &self,
    payload: ExternalSubmission,
  ) -> impl Future<Output = Result<SubmissionReceipt, Self::Error>> + Send + '_;

  /// Submissions of a survey, newest first.
  fn list_submissions<'a>(
    &'a self,
    survey_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + 'a;

  fn count_submissions<'a>(
    &'a self,
    survey_id: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// A submission with its answers resolved against the survey's questions.
  fn get_submission(
    &self,
    submission_id: i64,
  ) -> impl Future<Output = Result<Option<SubmissionDetail>, Self::Error>> + Send + '_;

  fn delete_submission(
    &self,
    submission_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Analytics & lifecycle ─────────────────────────────────────────────

  /// Read a consistent snapshot of a survey's questions and answers.
  /// Returns `None` if the survey does not exist.
  fn answer_sheet<'a>(
    &'a self,
    survey_id: &'a str,
  ) -> impl Future<Output = Result<Option<AnswerSheet>, Self::Error>> + Send + 'a;

  /// Promote every scheduled survey whose publish date is at or before `now`
  /// and return the promoted surveys.
  fn publish_due(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Survey>, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a user. Returns a conflict if the username is taken.
  fn create_user(
    &self,
    username: String,
    password_hash: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn find_user<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Cheap round trip proving the backend is reachable.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
