// src/handlers/exam.rs

use std::collections::HashMap;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{SqlitePool, types::Json as SqlJson};

use crate::{
    error::{AppError, AppJson},
    models::{
        candidate::{Candidate, ExamStatus},
        exam_attempt::{
            AttemptAnswer, ExamAttempt, ExamResultResponse, StartExamResponse,
            SubmitExamRequest, SubmitExamResponse, SubmittedAnswer,
        },
        exam_config::ExamConfig,
        question::{PublicQuestion, Question, QuestionsResponse},
    },
};

/// Outcome of grading one submission against the paper.
#[derive(Debug, PartialEq)]
struct GradedPaper {
    score: i64,
    answers: Vec<AttemptAnswer>,
}

fn question_id_of(raw: &SubmittedAnswer) -> Option<i64> {
    match raw.question_id.as_ref()? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Only JSON integers count as a selection.
fn selected_index_of(raw: &SubmittedAnswer) -> Option<i64> {
    raw.selected_index.as_ref()?.as_i64()
}

/// Scores a submission against the paper.
///
/// Every question on the paper gets exactly one recorded answer. A question
/// without a usable selection (missing, non-integer, or outside the option
/// range) is recorded as unanswered and never scores. When the client sends
/// the same question twice, the first entry wins.
fn grade_paper(paper: &[Question], submitted: &[SubmittedAnswer]) -> GradedPaper {
    let mut selections: HashMap<i64, Option<i64>> = HashMap::new();
    for raw in submitted {
        if let Some(question_id) = question_id_of(raw) {
            selections
                .entry(question_id)
                .or_insert_with(|| selected_index_of(raw));
        }
    }

    let mut score = 0;
    let mut answers = Vec::with_capacity(paper.len());

    for question in paper {
        let selected_index = selections
            .get(&question.id)
            .copied()
            .flatten()
            .filter(|&idx| idx >= 0 && (idx as usize) < question.option_count());

        if selected_index == Some(question.correct_index) {
            score += 1;
        }

        answers.push(AttemptAnswer {
            question_id: question.id,
            selected_index,
        });
    }

    GradedPaper { score, answers }
}

fn elapsed_minutes(started_at: DateTime<Utc>, submitted_at: DateTime<Utc>) -> f64 {
    (submitted_at - started_at).num_milliseconds() as f64 / 60_000.0
}

/// Returns the exam paper without correct answers.
#[utoipa::path(
    get,
    path = "/api/exam/questions",
    tag = "exam",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Exam paper", body = QuestionsResponse),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn get_questions(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let paper = Question::exam_paper(&pool).await.map_err(|e| {
        tracing::error!("Failed to fetch exam questions: {:?}", e);
        AppError::from(e)
    })?;

    let questions: Vec<PublicQuestion> = paper.into_iter().map(PublicQuestion::from).collect();

    Ok(Json(QuestionsResponse { questions }))
}

/// Starts the candidate's exam timer.
///
/// The start time is written once; calling again before submitting returns
/// the original start time.
#[utoipa::path(
    post,
    path = "/api/exam/start",
    tag = "exam",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Exam started", body = StartExamResponse),
        (status = 400, description = "Exam already completed"),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn start_exam(
    State(pool): State<SqlitePool>,
    Extension(candidate): Extension<Candidate>,
) -> Result<impl IntoResponse, AppError> {
    if candidate.status() == ExamStatus::Submitted {
        return Err(already_completed());
    }

    let config = ExamConfig::load_or_init(&pool).await?;
    let now = Utc::now();

    let started_at = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        UPDATE candidates
        SET started_at = COALESCE(started_at, ?1), updated_at = ?1
        WHERE id = ?2 AND has_attempted = 0
        RETURNING started_at
        "#,
    )
    .bind(now)
    .bind(candidate.id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to start exam: {:?}", e);
        AppError::from(e)
    })?
    .ok_or_else(already_completed)?;

    if candidate.started_at.is_none() {
        tracing::info!(candidate_id = candidate.id, %started_at, "Exam started");
    }

    Ok(Json(StartExamResponse {
        started_at,
        duration_minutes: config.duration_minutes,
    }))
}

/// Grades and records the candidate's single submission.
///
/// Late submissions are accepted; `on_time` reports whether the configured
/// duration was exceeded.
#[utoipa::path(
    post,
    path = "/api/exam/submit",
    tag = "exam",
    security(("bearer" = [])),
    request_body = SubmitExamRequest,
    responses(
        (status = 200, description = "Submission graded", body = SubmitExamResponse),
        (status = 400, description = "Exam not started or already submitted"),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn submit_exam(
    State(pool): State<SqlitePool>,
    Extension(candidate): Extension<Candidate>,
    AppJson(req): AppJson<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let started_at = match (candidate.status(), candidate.started_at) {
        (ExamStatus::Submitted, _) => return Err(already_submitted()),
        (ExamStatus::InProgress, Some(started_at)) => started_at,
        _ => return Err(AppError::StateConflict("Exam not started".to_string())),
    };

    let paper = Question::exam_paper(&pool).await?;
    let graded = grade_paper(&paper, &req.answers);

    let config = ExamConfig::load_or_init(&pool).await?;
    let passed = graded.score >= config.cutoff;
    let submitted_at = Utc::now();

    let mut tx = pool.begin().await?;

    // Claim the attempt. Losing this compare-and-set means another request submitted first.
    let claimed = sqlx::query(
        r#"
        UPDATE candidates
        SET has_attempted = 1, score = ?, passed = ?, submitted_at = ?, updated_at = ?
        WHERE id = ? AND has_attempted = 0 AND started_at IS NOT NULL
        "#,
    )
    .bind(graded.score)
    .bind(passed)
    .bind(submitted_at)
    .bind(submitted_at)
    .bind(candidate.id)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(already_submitted());
    }

    sqlx::query(
        r#"
        INSERT INTO exam_attempts
        (candidate_id, answers, score, cutoff, passed, started_at, submitted_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(candidate.id)
    .bind(SqlJson(graded.answers.clone()))
    .bind(graded.score)
    .bind(config.cutoff)
    .bind(passed)
    .bind(started_at)
    .bind(submitted_at)
    .bind(submitted_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record exam attempt: {:?}", e);
        AppError::from(e)
    })?;

    tx.commit().await?;

    let elapsed = elapsed_minutes(started_at, submitted_at);
    let on_time = elapsed <= config.duration_minutes as f64;
    let message = if on_time {
        "Submitted within time.".to_string()
    } else {
        format!(
            "Submitted after time; auto-closure would have happened at {} minutes.",
            config.duration_minutes
        )
    };

    tracing::info!(
        candidate_id = candidate.id,
        score = graded.score,
        cutoff = config.cutoff,
        passed,
        on_time,
        "Exam submitted"
    );

    Ok(Json(SubmitExamResponse {
        score: graded.score,
        total_questions: graded.answers.len(),
        cutoff: config.cutoff,
        passed,
        elapsed_minutes: elapsed,
        on_time,
        message,
    }))
}

/// Returns the graded result of the candidate's submission.
#[utoipa::path(
    get,
    path = "/api/exam/result",
    tag = "exam",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Exam result", body = ExamResultResponse),
        (status = 400, description = "Exam not submitted yet"),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn get_result(
    State(pool): State<SqlitePool>,
    Extension(candidate): Extension<Candidate>,
) -> Result<impl IntoResponse, AppError> {
    if candidate.status() != ExamStatus::Submitted {
        return Err(AppError::StateConflict("Exam not submitted yet.".to_string()));
    }

    let attempt = ExamAttempt::find_by_candidate(&pool, candidate.id)
        .await?
        .ok_or(AppError::NotFound("Exam attempt not found".to_string()))?;

    Ok(Json(ExamResultResponse {
        name: candidate.name,
        email: candidate.email,
        phone: candidate.phone,
        score: attempt.score,
        cutoff: attempt.cutoff,
        passed: attempt.passed,
        total_questions: attempt.answers.0.len(),
    }))
}

/// Returns the candidate's own attempt record.
#[utoipa::path(
    get,
    path = "/api/exam/attempt",
    tag = "exam",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Attempt record", body = ExamAttempt),
        (status = 404, description = "No attempt yet"),
    )
)]
pub async fn get_attempt(
    State(pool): State<SqlitePool>,
    Extension(candidate): Extension<Candidate>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = ExamAttempt::find_by_candidate(&pool, candidate.id)
        .await?
        .ok_or(AppError::NotFound("Exam attempt not found".to_string()))?;

    Ok(Json(attempt))
}

fn already_completed() -> AppError {
    AppError::StateConflict("You have already completed the exam.".to_string())
}

fn already_submitted() -> AppError {
    AppError::StateConflict("Exam already submitted".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn paper(size: i64) -> Vec<Question> {
        let now = Utc::now();
        (1..=size)
            .map(|id| Question {
                id,
                text: format!("Question {}", id),
                options: SqlJson(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
                correct_index: id % 4,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    fn answer(question_id: Value, selected_index: Value) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: Some(question_id),
            selected_index: Some(selected_index),
        }
    }

    /// Answers the first `correct` questions right and the rest wrong.
    fn answers_with_correct(paper: &[Question], correct: usize) -> Vec<SubmittedAnswer> {
        paper
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let idx = if i < correct {
                    q.correct_index
                } else {
                    (q.correct_index + 1) % 4
                };
                answer(json!(q.id), json!(idx))
            })
            .collect()
    }

    #[test]
    fn counts_exact_matches_only() {
        let paper = paper(10);
        let graded = grade_paper(&paper, &answers_with_correct(&paper, 7));
        assert_eq!(graded.score, 7);
        assert_eq!(graded.answers.len(), 10);
        assert!(graded.score >= 6);

        let graded = grade_paper(&paper, &answers_with_correct(&paper, 5));
        assert_eq!(graded.score, 5);
        assert!(graded.score < 6);
    }

    #[test]
    fn missing_answers_are_recorded_as_unanswered() {
        let paper = paper(3);
        let graded = grade_paper(&paper, &[answer(json!(2), json!(2))]);

        assert_eq!(graded.score, 1);
        assert_eq!(
            graded.answers,
            vec![
                AttemptAnswer { question_id: 1, selected_index: None },
                AttemptAnswer { question_id: 2, selected_index: Some(2) },
                AttemptAnswer { question_id: 3, selected_index: None },
            ]
        );
    }

    #[test]
    fn malformed_and_out_of_range_selections_never_score() {
        let paper = paper(4);
        let submitted = vec![
            answer(json!(1), json!("1")),
            answer(json!(2), json!(2.0)),
            answer(json!(3), json!(7)),
            answer(json!(4), json!(-1)),
        ];
        let graded = grade_paper(&paper, &submitted);

        assert_eq!(graded.score, 0);
        assert!(graded.answers.iter().all(|a| a.selected_index.is_none()));
    }

    #[test]
    fn accepts_string_question_ids_and_first_entry_wins() {
        let paper = paper(1);
        let submitted = vec![
            answer(json!("1"), json!(1)),
            answer(json!(1), json!(0)),
            SubmittedAnswer { question_id: None, selected_index: Some(json!(1)) },
        ];
        let graded = grade_paper(&paper, &submitted);

        assert_eq!(graded.score, 1);
        assert_eq!(graded.answers[0].selected_index, Some(1));
    }

    #[test]
    fn answers_for_unknown_questions_are_ignored() {
        let paper = paper(2);
        let graded = grade_paper(&paper, &[answer(json!(99), json!(0))]);
        assert_eq!(graded.score, 0);
        assert_eq!(graded.answers.len(), 2);
    }

    #[test]
    fn elapsed_is_reported_in_minutes() {
        let start = Utc::now();
        let end = start + Duration::seconds(90);
        assert_eq!(elapsed_minutes(start, end), 1.5);
    }
}
