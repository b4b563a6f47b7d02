//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup. `foreign_keys` must be on for the
//! cascades below to fire; SQLite leaves it off per connection by default.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS surveys (
    survey_id    TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    created_at   TEXT NOT NULL,    -- RFC 3339 UTC, fixed width
    status       TEXT NOT NULL
                 CHECK (status IN ('draft', 'published', 'scheduled')),
    publish_at   TEXT,             -- RFC 3339 UTC or NULL
    is_external  INTEGER NOT NULL DEFAULT 0,
    CHECK (status != 'scheduled' OR publish_at IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS questions (
    question_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_id    TEXT NOT NULL REFERENCES surveys(survey_id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    kind         TEXT NOT NULL,    -- 'TEXT' | 'MULTIPLE_CHOICE' | 'DROPDOWN' | 'CHECKBOX'
    options_json TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS submissions (
    submission_id INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_id     TEXT NOT NULL REFERENCES surveys(survey_id) ON DELETE CASCADE,
    submitted_at  TEXT NOT NULL
);

-- Values are stored verbatim as JSON: a scalar or a flat list of scalars.
CREATE TABLE IF NOT EXISTS answers (
    answer_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    submission_id INTEGER NOT NULL
                  REFERENCES submissions(submission_id) ON DELETE CASCADE,
    question_id   INTEGER NOT NULL
                  REFERENCES questions(question_id) ON DELETE CASCADE,
    value_json    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS questions_survey_title_idx ON questions(survey_id, title);
CREATE INDEX IF NOT EXISTS submissions_survey_idx     ON submissions(survey_id, submitted_at);
CREATE INDEX IF NOT EXISTS answers_submission_idx     ON answers(submission_id);
CREATE INDEX IF NOT EXISTS answers_question_idx       ON answers(question_id);
CREATE INDEX IF NOT EXISTS surveys_due_idx            ON surveys(status, publish_at);

PRAGMA user_version = 1;
";
