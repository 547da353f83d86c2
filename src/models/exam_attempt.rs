// src/models/exam_attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, types::Json};
use utoipa::ToSchema;

pub const ATTEMPT_COLUMNS: &str = "\
    id, candidate_id, answers, score, cutoff, passed, started_at, submitted_at, created_at";

/// Represents the 'exam_attempts' table: the immutable record of one submission.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ExamAttempt {
    pub id: i64,
    pub candidate_id: i64,
    #[schema(value_type = Vec<AttemptAnswer>)]
    pub answers: Json<Vec<AttemptAnswer>>,
    pub score: i64,
    /// Cutoff in effect when the attempt was graded.
    pub cutoff: i64,
    pub passed: bool,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ExamAttempt {
    pub async fn find_by_candidate<'e, E>(
        executor: E,
        candidate_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ExamAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE candidate_id = ?"
        ))
        .bind(candidate_id)
        .fetch_optional(executor)
        .await
    }
}

/// The candidate's choice for one question of the paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttemptAnswer {
    pub question_id: i64,
    /// `None` when unanswered or when the submitted value was unusable.
    pub selected_index: Option<i64>,
}

/// One entry of a submission as sent by the client.
///
/// Both fields are kept as raw JSON so a malformed entry degrades to
/// "unanswered" instead of failing the whole submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmittedAnswer {
    #[serde(default, alias = "questionId")]
    #[schema(value_type = Option<i64>)]
    pub question_id: Option<serde_json::Value>,
    #[serde(default, alias = "selectedIndex")]
    #[schema(value_type = Option<i64>)]
    pub selected_index: Option<serde_json::Value>,
}

/// DTO for submitting the exam.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitExamRequest {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartExamResponse {
    pub started_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitExamResponse {
    pub score: i64,
    pub total_questions: usize,
    pub cutoff: i64,
    pub passed: bool,
    pub elapsed_minutes: f64,
    /// Whether the submission arrived within the configured duration.
    pub on_time: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExamResultResponse {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub score: i64,
    pub cutoff: i64,
    pub passed: bool,
    pub total_questions: usize,
}
