// src/models/candidate.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

pub const CANDIDATE_COLUMNS: &str = "\
    id, name, email, phone, allowed, has_attempted, score, passed, \
    started_at, submitted_at, created_at, updated_at";

/// Represents the 'candidates' table: one roster entry and its single exam attempt state.
#[derive(Debug, Clone, FromRow)]
pub struct Candidate {
    pub id: i64,
    pub name: String,

    /// Unique. Used as the upsert key for roster uploads.
    pub email: String,

    pub phone: String,

    /// Eligibility flag. Ineligible candidates cannot log in.
    pub allowed: bool,

    pub has_attempted: bool,

    /// Set exactly once, at submission.
    pub score: Option<i64>,
    pub passed: Option<bool>,

    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a candidate is in the one-shot exam lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamStatus {
    NotStarted,
    InProgress,
    Submitted,
}

impl Candidate {
    pub fn status(&self) -> ExamStatus {
        if self.has_attempted {
            ExamStatus::Submitted
        } else if self.started_at.is_some() {
            ExamStatus::InProgress
        } else {
            ExamStatus::NotStarted
        }
    }
}

/// DTO for candidate login.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 254, message = "Email and phone are required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "Email and phone are required"))]
    pub phone: String,
}

/// Candidate summary returned alongside a fresh token.
#[derive(Debug, Serialize, ToSchema)]
pub struct CandidateProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub has_attempted: bool,
    pub score: Option<i64>,
}

impl From<Candidate> for CandidateProfile {
    fn from(c: Candidate) -> Self {
        Self {
            id: c.id,
            name: c.name,
            email: c.email,
            phone: c.phone,
            has_attempted: c.has_attempted,
            score: c.score,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub candidate: CandidateProfile,
}

/// One row of the admin results table.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct CandidateResult {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub allowed: bool,
    pub has_attempted: bool,
    pub score: Option<i64>,
    pub passed: Option<bool>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResultsResponse {
    pub users: Vec<CandidateResult>,
    pub appeared: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEligibilityRequest {
    pub allowed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RosterUploadResponse {
    pub message: String,
    /// Rows created or updated.
    pub count: usize,
    /// Rows ignored for missing email or phone.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        let now = Utc::now();
        Candidate {
            id: 1,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: "1".into(),
            allowed: true,
            has_attempted: false,
            score: None,
            passed: None,
            started_at: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_follows_lifecycle() {
        let mut c = candidate();
        assert_eq!(c.status(), ExamStatus::NotStarted);

        c.started_at = Some(Utc::now());
        assert_eq!(c.status(), ExamStatus::InProgress);

        c.has_attempted = true;
        c.submitted_at = Some(Utc::now());
        assert_eq!(c.status(), ExamStatus::Submitted);
    }

    #[test]
    fn login_requires_both_fields() {
        let req = LoginRequest {
            email: "ada@example.com".into(),
            phone: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
