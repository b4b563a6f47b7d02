//! Per-question answer-frequency analytics.
//!
//! Aggregation runs over an [`AnswerSheet`], a consistent snapshot of one
//! survey read by the store in a single transaction. How an answer is counted
//! depends on the question's cardinality; see [`AnswerValue::buckets`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  answer::AnswerValue,
  question::{Question, QuestionType},
  store::SurveyStore,
  survey::Survey,
};

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Everything analytics needs to know about one survey.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
  pub survey:            Survey,
  /// Count of submission rows, independent of how many answers each has.
  pub total_submissions: u64,
  pub questions:         Vec<QuestionAnswers>,
}

#[derive(Debug, Clone)]
pub struct QuestionAnswers {
  pub question: Question,
  pub values:   Vec<AnswerValue>,
}

// ─── Frequency table ─────────────────────────────────────────────────────────

/// Observed value (stringified) → number of answers exhibiting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable(BTreeMap<String, u64>);

impl FrequencyTable {
  /// Count `values` as answers to a question of type `kind`.
  pub fn tally<'a>(
    kind: QuestionType,
    values: impl IntoIterator<Item = &'a AnswerValue>,
  ) -> Self {
    let cardinality = kind.cardinality();
    let mut counts = BTreeMap::new();
    for value in values {
      for bucket in value.buckets(cardinality) {
        *counts.entry(bucket).or_insert(0) += 1;
      }
    }
    Self(counts)
  }

  pub fn get(&self, value: &str) -> u64 { self.0.get(value).copied().unwrap_or(0) }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnalytics {
  pub question_id:        i64,
  pub question_title:     String,
  pub question_type:      QuestionType,
  pub answer_frequencies: FrequencyTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyAnalytics {
  pub survey_id:         String,
  pub survey_title:      String,
  pub total_submissions: u64,
  pub results:           Vec<QuestionAnalytics>,
}

impl From<AnswerSheet> for SurveyAnalytics {
  fn from(sheet: AnswerSheet) -> Self {
    let results = sheet
      .questions
      .into_iter()
      .map(|qa| QuestionAnalytics {
        answer_frequencies: FrequencyTable::tally(qa.question.kind, &qa.values),
        question_id:        qa.question.question_id,
        question_title:     qa.question.title,
        question_type:      qa.question.kind,
      })
      .collect();

    Self {
      survey_id: sheet.survey.survey_id,
      survey_title: sheet.survey.title,
      total_submissions: sheet.total_submissions,
      results,
    }
  }
}

/// Read a fresh snapshot of `survey_id` from `store` and aggregate it.
pub async fn compute_analytics<S: SurveyStore>(
  store: &S,
  survey_id: &str,
) -> Result<SurveyAnalytics> {
  let sheet = store
    .answer_sheet(survey_id)
    .await
    .map_err(Into::<Error>::into)?
    .ok_or_else(|| Error::not_found("survey", survey_id))?;
  Ok(sheet.into())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::survey::SurveyStatus;

  fn question(id: i64, kind: QuestionType) -> Question {
    Question {
      question_id: id,
      survey_id:   "s".into(),
      title:       format!("Q{id}"),
      kind,
      options:     Vec::new(),
    }
  }

  #[test]
  fn checkbox_counts_each_element() {
    let values = [AnswerValue::list(["A", "B"]), AnswerValue::list(["B"])];
    let table = FrequencyTable::tally(QuestionType::Checkbox, &values);
    assert_eq!(table.get("A"), 1);
    assert_eq!(table.get("B"), 2);
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn single_value_counts_one_bucket_per_answer() {
    let values = [
      AnswerValue::text("yes"),
      AnswerValue::text("no"),
      AnswerValue::text("yes"),
    ];
    let table = FrequencyTable::tally(QuestionType::MultipleChoice, &values);
    assert_eq!(table.get("yes"), 2);
    assert_eq!(table.get("no"), 1);
  }

  #[test]
  fn single_value_uses_first_element_of_lists() {
    let values = [AnswerValue::list(["x", "y"]), AnswerValue::text("x")];
    let table = FrequencyTable::tally(QuestionType::Dropdown, &values);
    assert_eq!(table.get("x"), 2);
    assert_eq!(table.get("y"), 0);
  }

  #[test]
  fn report_keeps_unanswered_questions_with_empty_tables() {
    let sheet = AnswerSheet {
      survey:            Survey {
        survey_id:   "s".into(),
        title:       "Survey".into(),
        created_at:  Utc::now(),
        status:      SurveyStatus::Published,
        publish_at:  None,
        is_external: false,
      },
      total_submissions: 3,
      questions:         vec![
        QuestionAnswers {
          question: question(1, QuestionType::Text),
          values:   vec![AnswerValue::text("hi")],
        },
        QuestionAnswers { question: question(2, QuestionType::Checkbox), values: vec![] },
      ],
    };

    let report = SurveyAnalytics::from(sheet);
    assert_eq!(report.total_submissions, 3);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].answer_frequencies.get("hi"), 1);
    assert!(report.results[1].answer_frequencies.is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][0]["answer_frequencies"]["hi"], 1);
    assert_eq!(json["results"][1]["question_type"], "CHECKBOX");
  }
}
