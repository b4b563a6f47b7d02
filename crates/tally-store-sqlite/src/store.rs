//! [`SqliteStore`], the SQLite implementation of [`SurveyStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior, params};
use uuid::Uuid;

use tally_core::{
  Error as CoreError,
  analytics::{AnswerSheet, QuestionAnswers},
  answer::{Answer, AnswerPolicy, AnswerValue},
  lifecycle,
  question::{NewQuestion, Question, QuestionPatch},
  store::SurveyStore,
  submission::{
    AnswerInput, ExternalSubmission, Response, Submission, SubmissionDetail,
    SubmissionReceipt, SubmitMode,
  },
  survey::{NewSurvey, Survey, SurveyPatch, SurveyQuery, SurveyStatus},
  user::{User, validate_username},
};

use crate::{
  Error, Result,
  encode::{
    QUESTION_COLUMNS, RawAnswer, RawQuestion, RawSubmission, RawSurvey, RawUser,
    SURVEY_COLUMNS, decode_answer, decode_question_type, encode_answer,
    encode_dt, encode_options, stored_now, truncate_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally survey store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  policy: AnswerPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy: AnswerPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy: AnswerPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Set how answers are checked against their questions on ingestion.
  pub fn with_answer_policy(mut self, policy: AnswerPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn answer_policy(&self) -> AnswerPolicy { self.policy }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside an immediate (write-locking) transaction. The transaction
  /// commits only if `f` succeeds; any error rolls it back.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    Ok(
      self
        .conn
        .call(move |conn| Ok(in_transaction(conn, TransactionBehavior::Immediate, f)))
        .await??,
    )
  }

  /// Run `f` inside a deferred transaction, giving it a consistent snapshot.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    Ok(
      self
        .conn
        .call(move |conn| Ok(in_transaction(conn, TransactionBehavior::Deferred, f)))
        .await??,
    )
  }
}

fn in_transaction<T>(
  conn: &mut Connection,
  behavior: TransactionBehavior,
  f: impl FnOnce(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
  let tx = conn.transaction_with_behavior(behavior)?;
  let out = f(&tx)?;
  tx.commit()?;
  Ok(out)
}

fn not_found(entity: &'static str, id: impl ToString) -> Error {
  CoreError::not_found(entity, id).into()
}

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// Synchronous building blocks run on the database thread, always inside a
// transaction opened by `SqliteStore::write` or `SqliteStore::read`.

fn fetch_survey(conn: &Connection, survey_id: &str) -> Result<Option<Survey>> {
  let sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE survey_id = ?1");
  conn
    .query_row(&sql, [survey_id], RawSurvey::from_row)
    .optional()?
    .map(RawSurvey::into_survey)
    .transpose()
}

fn require_survey(conn: &Connection, survey_id: &str) -> Result<Survey> {
  fetch_survey(conn, survey_id)?.ok_or_else(|| not_found("survey", survey_id))
}

fn insert_survey(conn: &Connection, survey: &Survey) -> Result<()> {
  conn.execute(
    "INSERT INTO surveys (survey_id, title, created_at, status, publish_at, is_external)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      survey.survey_id,
      survey.title,
      encode_dt(survey.created_at),
      survey.status.as_str(),
      survey.publish_at.map(encode_dt),
      survey.is_external,
    ],
  )?;
  Ok(())
}

fn save_survey(conn: &Connection, survey: &Survey) -> Result<()> {
  conn.execute(
    "UPDATE surveys SET title = ?2, status = ?3, publish_at = ?4 WHERE survey_id = ?1",
    params![
      survey.survey_id,
      survey.title,
      survey.status.as_str(),
      survey.publish_at.map(encode_dt),
    ],
  )?;
  Ok(())
}

fn fetch_question(conn: &Connection, question_id: i64) -> Result<Option<Question>> {
  let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE question_id = ?1");
  conn
    .query_row(&sql, [question_id], RawQuestion::from_row)
    .optional()?
    .map(RawQuestion::into_question)
    .transpose()
}

fn questions_of(conn: &Connection, survey_id: &str) -> Result<Vec<Question>> {
  let sql = format!(
    "SELECT {QUESTION_COLUMNS} FROM questions WHERE survey_id = ?1 ORDER BY question_id"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map([survey_id], RawQuestion::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawQuestion::into_question).collect()
}

/// Exact, case-sensitive title match. Should a survey ever hold two questions
/// with the same title, the oldest wins.
fn question_by_title(conn: &Connection, survey_id: &str, title: &str) -> Result<Option<Question>> {
  let sql = format!(
    "SELECT {QUESTION_COLUMNS} FROM questions
     WHERE survey_id = ?1 AND title = ?2
     ORDER BY question_id LIMIT 1"
  );
  conn
    .query_row(&sql, [survey_id, title], RawQuestion::from_row)
    .optional()?
    .map(RawQuestion::into_question)
    .transpose()
}

fn insert_question(conn: &Connection, survey_id: &str, input: &NewQuestion) -> Result<Question> {
  let options = input.validate()?;
  conn.execute(
    "INSERT INTO questions (survey_id, title, kind, options_json) VALUES (?1, ?2, ?3, ?4)",
    params![survey_id, input.title, input.kind.as_str(), encode_options(&options)?],
  )?;
  Ok(Question {
    question_id: conn.last_insert_rowid(),
    survey_id: survey_id.to_owned(),
    title: input.title.clone(),
    kind: input.kind,
    options,
  })
}

/// Insert one submission row and its answers in the given order.
fn record_submission(
  conn: &Connection,
  survey_id: &str,
  answers: Vec<(i64, AnswerValue)>,
) -> Result<SubmissionReceipt> {
  let submitted_at = stored_now();
  conn.execute(
    "INSERT INTO submissions (survey_id, submitted_at) VALUES (?1, ?2)",
    params![survey_id, encode_dt(submitted_at)],
  )?;
  let submission_id = conn.last_insert_rowid();

  let mut stmt = conn.prepare_cached(
    "INSERT INTO answers (submission_id, question_id, value_json) VALUES (?1, ?2, ?3)",
  )?;
  let mut saved = Vec::with_capacity(answers.len());
  for (question_id, answer_value) in answers {
    stmt.execute(params![submission_id, question_id, encode_answer(&answer_value)?])?;
    saved.push(Answer {
      answer_id: conn.last_insert_rowid(),
      submission_id,
      question_id,
      answer_value,
    });
  }

  Ok(SubmissionReceipt {
    submission: Submission { submission_id, survey_id: survey_id.to_owned(), submitted_at },
    answers:    saved,
  })
}

fn count_rows(conn: &Connection, survey_id: &str) -> Result<u64> {
  let n: i64 = conn.query_row(
    "SELECT COUNT(*) FROM submissions WHERE survey_id = ?1",
    [survey_id],
    |r| r.get(0),
  )?;
  Ok(n.max(0) as u64)
}

/// What an external ingestion had to create on its way to the submission.
struct Ingested {
  receipt:           SubmissionReceipt,
  created_survey:    bool,
  created_questions: usize,
}

fn ingest(conn: &Connection, payload: ExternalSubmission, policy: AnswerPolicy) -> Result<Ingested> {
  payload.validate()?;

  let (survey, created_survey) = match fetch_survey(conn, &payload.survey_id)? {
    Some(survey) => (survey, false),
    None => {
      let title = payload.survey_title.clone().ok_or_else(|| {
        CoreError::validation(format!(
          "survey {} does not exist; surveyTitle is required to create it",
          payload.survey_id
        ))
      })?;
      let survey = Survey {
        survey_id: payload.survey_id.clone(),
        title,
        created_at: stored_now(),
        status: SurveyStatus::Published,
        publish_at: None,
        is_external: true,
      };
      insert_survey(conn, &survey)?;
      (survey, true)
    }
  };

  let mut created_questions = 0;
  let mut resolved = Vec::with_capacity(payload.answers.len());
  for (descriptor, value) in payload.pairs() {
    let question = match question_by_title(conn, &survey.survey_id, &descriptor.title)? {
      Some(q) => q,
      None => {
        created_questions += 1;
        insert_question(conn, &survey.survey_id, descriptor)?
      }
    };
    policy.check(&question, value)?;
    resolved.push((question.question_id, value.clone()));
  }

  let receipt = record_submission(conn, &survey.survey_id, resolved)?;
  Ok(Ingested { receipt, created_survey, created_questions })
}

// ─── SurveyStore impl ────────────────────────────────────────────────────────

impl SurveyStore for SqliteStore {
  type Error = Error;

  // ── Surveys ───────────────────────────────────────────────────────────────

  async fn create_survey(&self, input: NewSurvey) -> Result<Survey> {
    let now = stored_now();
    let (status, publish_at) = lifecycle::initial_state(&input, now)?;

    let survey = Survey {
      survey_id: input.survey_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      title: input.title,
      created_at: now,
      status,
      publish_at: publish_at.map(truncate_dt),
      is_external: false,
    };

    let row = survey.clone();
    self
      .write(move |tx| {
        if fetch_survey(tx, &row.survey_id)?.is_some() {
          return Err(
            CoreError::Conflict(format!("survey {} already exists", row.survey_id)).into(),
          );
        }
        insert_survey(tx, &row)
      })
      .await?;

    tracing::info!(survey_id = %survey.survey_id, status = %survey.status, "created survey");
    Ok(survey)
  }

  async fn get_survey(&self, survey_id: &str) -> Result<Option<Survey>> {
    let survey_id = survey_id.to_owned();
    self.read(move |tx| fetch_survey(tx, &survey_id)).await
  }

  async fn list_surveys(&self, query: &SurveyQuery) -> Result<Vec<Survey>> {
    let status = query.status.map(|s| s.as_str());
    let is_external = query.is_external;
    // SQLite treats a negative LIMIT as "no limit".
    let limit = query.limit.map_or(-1, |l| l as i64);
    let offset = query.offset.unwrap_or(0) as i64;

    self
      .read(move |tx| {
        let sql = format!(
          "SELECT {SURVEY_COLUMNS} FROM surveys
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR is_external = ?2)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3 OFFSET ?4"
        );
        let mut stmt = tx.prepare(&sql)?;
        let raws = stmt
          .query_map(params![status, is_external, limit, offset], RawSurvey::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawSurvey::into_survey).collect()
      })
      .await
  }

  async fn update_survey(&self, survey_id: &str, patch: SurveyPatch) -> Result<Survey> {
    let survey_id = survey_id.to_owned();
    let now = Utc::now();

    let survey = self
      .write(move |tx| {
        let mut survey = require_survey(tx, &survey_id)?;
        lifecycle::apply_patch(&mut survey, patch, now)?;
        survey.publish_at = survey.publish_at.map(truncate_dt);
        save_survey(tx, &survey)?;
        Ok(survey)
      })
      .await?;

    tracing::info!(survey_id = %survey.survey_id, status = %survey.status, "updated survey");
    Ok(survey)
  }

  async fn delete_survey(&self, survey_id: &str) -> Result<()> {
    let survey_id = survey_id.to_owned();
    self
      .write(move |tx| {
        let n = tx.execute("DELETE FROM surveys WHERE survey_id = ?1", [&survey_id])?;
        if n == 0 {
          return Err(not_found("survey", &survey_id));
        }
        tracing::info!(%survey_id, "deleted survey");
        Ok(())
      })
      .await
  }

  // ── Questions ─────────────────────────────────────────────────────────────

  async fn add_question(&self, survey_id: &str, input: NewQuestion) -> Result<Question> {
    let survey_id = survey_id.to_owned();
    let question = self
      .write(move |tx| {
        let survey = require_survey(tx, &survey_id)?;
        lifecycle::ensure_mutable(&survey)?;
        insert_question(tx, &survey.survey_id, &input)
      })
      .await?;

    tracing::info!(
      question_id = question.question_id,
      survey_id = %question.survey_id,
      kind = %question.kind,
      "added question"
    );
    Ok(question)
  }

  async fn get_question(&self, question_id: i64) -> Result<Option<Question>> {
    self.read(move |tx| fetch_question(tx, question_id)).await
  }

  async fn list_questions(&self, survey_id: &str) -> Result<Vec<Question>> {
    let survey_id = survey_id.to_owned();
    self
      .read(move |tx| {
        require_survey(tx, &survey_id)?;
        questions_of(tx, &survey_id)
      })
      .await
  }

  async fn find_question(&self, survey_id: &str, title: &str) -> Result<Option<Question>> {
    let survey_id = survey_id.to_owned();
    let title = title.to_owned();
    self.read(move |tx| question_by_title(tx, &survey_id, &title)).await
  }

  async fn update_question(&self, question_id: i64, patch: QuestionPatch) -> Result<Question> {
    self
      .write(move |tx| {
        let current =
          fetch_question(tx, question_id)?.ok_or_else(|| not_found("question", question_id))?;
        lifecycle::ensure_mutable(&require_survey(tx, &current.survey_id)?)?;

        let updated = patch.apply(&current)?;
        tx.execute(
          "UPDATE questions SET title = ?2, kind = ?3, options_json = ?4
           WHERE question_id = ?1",
          params![
            question_id,
            updated.title,
            updated.kind.as_str(),
            encode_options(&updated.options)?,
          ],
        )?;
        Ok(updated)
      })
      .await
  }

  async fn delete_question(&self, question_id: i64) -> Result<()> {
    self
      .write(move |tx| {
        let current =
          fetch_question(tx, question_id)?.ok_or_else(|| not_found("question", question_id))?;
        lifecycle::ensure_mutable(&require_survey(tx, &current.survey_id)?)?;
        tx.execute("DELETE FROM questions WHERE question_id = ?1", [question_id])?;
        Ok(())
      })
      .await
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn submit(
    &self,
    survey_id: &str,
    answers: Vec<AnswerInput>,
    mode: SubmitMode,
  ) -> Result<SubmissionReceipt> {
    let survey_id = survey_id.to_owned();
    let policy = self.policy;

    let receipt = self
      .write(move |tx| {
        // The public form cannot tell a draft from a missing survey.
        let survey = fetch_survey(tx, &survey_id)?
          .filter(|s| mode == SubmitMode::Managed || s.status == SurveyStatus::Published)
          .ok_or_else(|| not_found("survey", &survey_id))?;

        let mut resolved = Vec::with_capacity(answers.len());
        for input in answers {
          let question = fetch_question(tx, input.question_id)?
            .filter(|q| q.survey_id == survey.survey_id)
            .ok_or_else(|| {
              CoreError::validation(format!(
                "question {} does not belong to survey {}",
                input.question_id, survey.survey_id
              ))
            })?;
          policy.check(&question, &input.answer_value)?;
          resolved.push((question.question_id, input.answer_value));
        }
        record_submission(tx, &survey.survey_id, resolved)
      })
      .await?;

    tracing::debug!(
      submission_id = receipt.submission.submission_id,
      survey_id = %receipt.submission.survey_id,
      answers = receipt.answers.len(),
      ?mode,
      "recorded submission"
    );
    Ok(receipt)
  }

  async fn ingest_external(&self, payload: ExternalSubmission) -> Result<SubmissionReceipt> {
    let policy = self.policy;
    let ingested = self.write(move |tx| ingest(tx, payload, policy)).await?;

    let submission = &ingested.receipt.submission;
    if ingested.created_survey {
      tracing::info!(survey_id = %submission.survey_id, "created external survey");
    }
    tracing::debug!(
      submission_id = submission.submission_id,
      survey_id = %submission.survey_id,
      created_questions = ingested.created_questions,
      answers = ingested.receipt.answers.len(),
      "ingested external submission"
    );
    Ok(ingested.receipt)
  }

  async fn list_submissions(&self, survey_id: &str) -> Result<Vec<Submission>> {
    let survey_id = survey_id.to_owned();
    self
      .read(move |tx| {
        require_survey(tx, &survey_id)?;
        let mut stmt = tx.prepare(
          "SELECT submission_id, survey_id, submitted_at FROM submissions
           WHERE survey_id = ?1
           ORDER BY submitted_at DESC, submission_id DESC",
        )?;
        let raws = stmt
          .query_map([&survey_id], RawSubmission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawSubmission::into_submission).collect()
      })
      .await
  }

  async fn count_submissions(&self, survey_id: &str) -> Result<u64> {
    let survey_id = survey_id.to_owned();
    self
      .read(move |tx| {
        require_survey(tx, &survey_id)?;
        count_rows(tx, &survey_id)
      })
      .await
  }

  async fn get_submission(&self, submission_id: i64) -> Result<Option<SubmissionDetail>> {
    self
      .read(move |tx| {
        let Some(raw) = tx
          .query_row(
            "SELECT submission_id, survey_id, submitted_at FROM submissions
             WHERE submission_id = ?1",
            [submission_id],
            RawSubmission::from_row,
          )
          .optional()?
        else {
          return Ok(None);
        };
        let submission = raw.into_submission()?;
        let survey = require_survey(tx, &submission.survey_id)?;

        let mut stmt = tx.prepare(
          "SELECT a.question_id, q.title, q.kind, a.value_json
           FROM answers a
           JOIN questions q ON q.question_id = a.question_id
           WHERE a.submission_id = ?1
           ORDER BY a.answer_id",
        )?;
        let rows = stmt
          .query_map([submission_id], |r| {
            Ok((
              r.get::<_, i64>(0)?,
              r.get::<_, String>(1)?,
              r.get::<_, String>(2)?,
              r.get::<_, String>(3)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let responses = rows
          .into_iter()
          .map(|(question_id, question, kind, value_json)| {
            Ok(Response {
              question_id,
              question,
              kind: decode_question_type(&kind)?,
              answer: decode_answer(&value_json)?,
            })
          })
          .collect::<Result<Vec<_>>>()?;

        Ok(Some(SubmissionDetail {
          submission_id,
          submitted_at: submission.submitted_at,
          survey_id: survey.survey_id,
          survey_title: survey.title,
          responses,
        }))
      })
      .await
  }

  async fn delete_submission(&self, submission_id: i64) -> Result<()> {
    self
      .write(move |tx| {
        let n = tx.execute("DELETE FROM submissions WHERE submission_id = ?1", [submission_id])?;
        if n == 0 {
          return Err(not_found("submission", submission_id));
        }
        Ok(())
      })
      .await
  }

  // ── Analytics & lifecycle ─────────────────────────────────────────────────

  async fn answer_sheet(&self, survey_id: &str) -> Result<Option<AnswerSheet>> {
    let survey_id = survey_id.to_owned();
    self
      .read(move |tx| {
        let Some(survey) = fetch_survey(tx, &survey_id)? else {
          return Ok(None);
        };
        let total_submissions = count_rows(tx, &survey_id)?;
        let questions = questions_of(tx, &survey_id)?;

        let mut stmt = tx.prepare(
          "SELECT a.answer_id, a.submission_id, a.question_id, a.value_json
           FROM answers a
           JOIN questions q ON q.question_id = a.question_id
           WHERE q.survey_id = ?1
           ORDER BY a.answer_id",
        )?;
        let raws = stmt
          .query_map([&survey_id], |r| {
            Ok(RawAnswer {
              answer_id:     r.get(0)?,
              submission_id: r.get(1)?,
              question_id:   r.get(2)?,
              value_json:    r.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut by_question: HashMap<i64, Vec<AnswerValue>> = HashMap::new();
        for raw in raws {
          let answer = raw.into_answer()?;
          by_question.entry(answer.question_id).or_default().push(answer.answer_value);
        }

        let questions = questions
          .into_iter()
          .map(|question| QuestionAnswers {
            values: by_question.remove(&question.question_id).unwrap_or_default(),
            question,
          })
          .collect();

        Ok(Some(AnswerSheet { survey, total_submissions, questions }))
      })
      .await
  }

  async fn publish_due(&self, now: DateTime<Utc>) -> Result<Vec<Survey>> {
    self
      .write(move |tx| {
        let sql = format!(
          "SELECT {SURVEY_COLUMNS} FROM surveys
           WHERE status = 'scheduled' AND publish_at <= ?1
           ORDER BY publish_at"
        );
        let mut stmt = tx.prepare(&sql)?;
        let raws = stmt
          .query_map([encode_dt(now)], RawSurvey::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut published = Vec::with_capacity(raws.len());
        for raw in raws {
          let mut survey = raw.into_survey()?;
          if lifecycle::promote_if_due(&mut survey, now) {
            save_survey(tx, &survey)?;
            published.push(survey);
          }
        }
        Ok(published)
      })
      .await
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, username: String, password_hash: String) -> Result<User> {
    validate_username(&username)?;
    let user = self
      .write(move |tx| {
        let taken = tx
          .query_row("SELECT 1 FROM users WHERE username = ?1", [&username], |_| Ok(()))
          .optional()?
          .is_some();
        if taken {
          return Err(CoreError::Conflict(format!("user {username} already exists")).into());
        }
        tx.execute(
          "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
          params![username, password_hash],
        )?;
        Ok(User { user_id: tx.last_insert_rowid(), username, password_hash })
      })
      .await?;

    tracing::info!(username = %user.username, "created user");
    Ok(user)
  }

  async fn find_user(&self, username: &str) -> Result<Option<User>> {
    let username = username.to_owned();
    self
      .read(move |tx| {
        Ok(
          tx.query_row(
            "SELECT user_id, username, password_hash FROM users WHERE username = ?1",
            [&username],
            |r| {
              Ok(RawUser {
                user_id:       r.get(0)?,
                username:      r.get(1)?,
                password_hash: r.get(2)?,
              })
            },
          )
          .optional()?
          .map(RawUser::into_user),
        )
      })
      .await
  }

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
