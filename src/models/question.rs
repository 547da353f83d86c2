// src/models/question.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, prelude::FromRow, types::Json};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::config::EXAM_QUESTION_COUNT;

pub const QUESTION_COLUMNS: &str = "id, text, options, correct_index, created_at, updated_at";

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Question {
    pub id: i64,

    /// The prompt shown to the candidate.
    pub text: String,

    /// Answer options in display order, stored as a JSON array.
    #[schema(value_type = Vec<String>)]
    pub options: Json<Vec<String>>,

    /// 0-based index into `options`.
    pub correct_index: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn option_count(&self) -> usize {
        self.options.0.len()
    }

    /// The exam paper: the first `EXAM_QUESTION_COUNT` questions in id order.
    ///
    /// Read live on every call, so admin edits made during an exam are
    /// visible to candidates who have not yet submitted.
    pub async fn exam_paper<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id LIMIT ?"
        ))
        .bind(EXAM_QUESTION_COUNT)
        .fetch_all(executor)
        .await
    }
}

/// DTO sent to candidates. Carries no correct answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options.0,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionsResponse {
    pub questions: Vec<PublicQuestion>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = validate_correct_index))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000, message = "Question text is required"))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_index: i64,
}

/// Every option must be non-blank and at most 500 characters.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() < 2 {
        return Err(ValidationError::new("at_least_two_options")
            .with_message("At least two options are required".into()));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(ValidationError::new("empty_option"));
        }
        if opt.len() > 500 {
            return Err(ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_correct_index(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    check_correct_index(req.correct_index, req.options.len())
}

/// `correct_index` must point at an existing option.
pub fn check_correct_index(correct_index: i64, option_count: usize) -> Result<(), ValidationError> {
    if correct_index < 0 || correct_index as usize >= option_count {
        return Err(ValidationError::new("correct_index_out_of_range")
            .with_message("correct_index must reference one of the options".into()));
    }
    Ok(())
}

/// DTO for updating a question. Fields are optional.
///
/// Blank text and option lists shorter than two are ignored rather than rejected.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuestionRequest {
    pub text: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_index: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(options: &[&str], correct_index: i64) -> CreateQuestionRequest {
        CreateQuestionRequest {
            text: "Capital of France?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_index,
        }
    }

    #[test]
    fn accepts_well_formed_question() {
        assert!(request(&["Paris", "Rome"], 0).validate().is_ok());
    }

    #[test]
    fn rejects_single_option() {
        assert!(request(&["Paris"], 0).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_answer() {
        assert!(request(&["Paris", "Rome"], 2).validate().is_err());
        assert!(request(&["Paris", "Rome"], -1).validate().is_err());
    }

    #[test]
    fn public_question_drops_answer() {
        let now = Utc::now();
        let q = Question {
            id: 3,
            text: "Capital of France?".into(),
            options: Json(vec!["Paris".into(), "Rome".into()]),
            correct_index: 0,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(PublicQuestion::from(q)).unwrap();
        assert!(json.get("correct_index").is_none());
        assert_eq!(json["options"][1], "Rome");
    }
}
