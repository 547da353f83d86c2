// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json as SqlJson};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, AppJson},
    models::{
        candidate::{
            CandidateResult, ResultsResponse, RosterUploadResponse, UpdateEligibilityRequest,
        },
        exam_attempt::ExamAttempt,
        exam_config::{ExamConfig, UpdateConfigRequest},
        question::{
            CreateQuestionRequest, QUESTION_COLUMNS, Question, UpdateQuestionRequest,
            check_correct_index, validate_options,
        },
    },
    utils::{
        hash::verify_secret,
        jwt::{ROLE_ADMIN, sign_jwt},
        roster::{RosterRow, parse_roster},
    },
};

/// DTO for exchanging the admin secret for a token.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminLoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// Exchanges the shared admin secret for a short-lived admin token.
#[utoipa::path(
    post,
    path = "/api/admin/login",
    tag = "admin",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Admin token issued", body = AdminLoginResponse),
        (status = 401, description = "Wrong admin secret"),
    )
)]
pub async fn admin_login(
    State(config): State<Config>,
    AppJson(payload): AppJson<AdminLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.secret.is_empty() || !verify_secret(&payload.secret, &config.admin_secret_hash)? {
        tracing::warn!("Rejected admin login with invalid secret");
        return Err(AppError::AuthError("Invalid admin secret".to_string()));
    }

    let token = sign_jwt(
        ROLE_ADMIN,
        ROLE_ADMIN,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(AdminLoginResponse {
        token,
        token_type: "Bearer".to_string(),
    }))
}

/// Creates or updates one roster entry, keyed by email.
///
/// Existing entries get the new phone, the new name when one is given, and
/// their eligibility re-enabled.
async fn upsert_candidate(pool: &SqlitePool, row: &RosterRow) -> Result<(), sqlx::Error> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO candidates (name, email, phone, allowed, created_at, updated_at)
        VALUES (?1, ?2, ?3, 1, ?4, ?4)
        ON CONFLICT(email) DO UPDATE SET
            phone = excluded.phone,
            name = CASE WHEN excluded.name <> '' THEN excluded.name ELSE candidates.name END,
            allowed = 1,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&row.name)
    .bind(&row.email)
    .bind(&row.phone)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Uploads the candidate roster (Excel workbook or CSV) in the multipart field `file`.
///
/// Rows are applied one by one; rows without email or phone are skipped and
/// a failure part way through leaves earlier rows committed.
#[utoipa::path(
    post,
    path = "/api/admin/upload-users",
    tag = "admin",
    security(("bearer" = [])),
    request_body(content = String, content_type = "multipart/form-data", description = "Roster workbook (.xlsx, .xls, .ods) or CSV in field `file`"),
    responses(
        (status = 200, description = "Roster applied", body = RosterUploadResponse),
        (status = 400, description = "No file or unreadable roster"),
    )
)]
pub async fn upload_users(
    State(pool): State<SqlitePool>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            file = Some(field.bytes().await?);
        }
    }

    let file = file.ok_or(AppError::BadRequest("No file uploaded".to_string()))?;
    let rows = parse_roster(&file)?;

    let mut count = 0;
    let mut skipped = 0;

    for row in &rows {
        if !row.is_complete() {
            skipped += 1;
            continue;
        }

        upsert_candidate(&pool, row).await.map_err(|e| {
            tracing::error!("Roster upload failed after {} rows: {:?}", count, e);
            AppError::from(e)
        })?;
        count += 1;
    }

    tracing::info!(count, skipped, "Roster uploaded");

    Ok(Json(RosterUploadResponse {
        message: "Users uploaded/updated".to_string(),
        count,
        skipped,
    }))
}

/// Lists the whole question bank, including correct answers.
#[utoipa::path(
    get,
    path = "/api/admin/questions",
    tag = "admin",
    security(("bearer" = [])),
    responses((status = 200, description = "Question bank", body = [Question]))
)]
pub async fn list_questions(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list questions: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(questions))
}

/// Creates a new question.
#[utoipa::path(
    post,
    path = "/api/admin/questions",
    tag = "admin",
    security(("bearer" = [])),
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question created", body = Question),
        (status = 400, description = "Invalid question"),
    )
)]
pub async fn create_question(
    State(pool): State<SqlitePool>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = CreateQuestionRequest {
        text: payload.text.trim().to_string(),
        options: payload.options.iter().map(|o| o.trim().to_string()).collect(),
        correct_index: payload.correct_index,
    };
    payload.validate()?;

    let now = Utc::now();

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO questions (text, options, correct_index, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(&payload.text)
    .bind(SqlJson(payload.options.clone()))
    .bind(payload.correct_index)
    .bind(now)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question by ID.
///
/// Blank text and option lists shorter than two are ignored. The resulting
/// question must still have its correct index within its options.
#[utoipa::path(
    put,
    path = "/api/admin/questions/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Question id")),
    request_body = UpdateQuestionRequest,
    responses(
        (status = 200, description = "Updated question", body = Question),
        (status = 400, description = "Correct index out of range"),
        (status = 404, description = "Question not found"),
    )
)]
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let existing = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let text = payload
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let options = payload
        .options
        .map(|opts| opts.iter().map(|o| o.trim().to_string()).collect::<Vec<_>>())
        .filter(|opts| opts.len() >= 2);

    if let Some(options) = &options {
        validate_options(options).map_err(|e| AppError::BadRequest(e.to_string()))?;
    }

    if text.is_none() && options.is_none() && payload.correct_index.is_none() {
        return Ok(Json(existing));
    }

    let option_count = options
        .as_ref()
        .map(Vec::len)
        .unwrap_or_else(|| existing.option_count());
    let correct_index = payload.correct_index.unwrap_or(existing.correct_index);
    check_correct_index(correct_index, option_count)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(text) = text {
        separated.push("text = ");
        separated.push_bind_unseparated(text);
    }

    if let Some(options) = options {
        separated.push("options = ");
        separated.push_bind_unseparated(SqlJson(options));
    }

    if let Some(correct_index) = payload.correct_index {
        separated.push("correct_index = ");
        separated.push_bind_unseparated(correct_index);
    }

    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now());

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {QUESTION_COLUMNS}"));

    let question = builder
        .build_query_as::<Question>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::from(e)
        })?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question))
}

/// Deletes a question by ID. Submitted attempts keep their recorded answers.
#[utoipa::path(
    delete,
    path = "/api/admin/questions/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question deleted"),
        (status = 404, description = "Question not found"),
    )
)]
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

/// Reads the exam config, creating it with defaults on first access.
#[utoipa::path(
    get,
    path = "/api/admin/config",
    tag = "admin",
    security(("bearer" = [])),
    responses((status = 200, description = "Current exam config", body = ExamConfig))
)]
pub async fn get_config(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let config = ExamConfig::load_or_init(&pool).await.map_err(|e| {
        tracing::error!("Failed to load exam config: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(config))
}

/// Writes the cutoff (and optionally the duration) of the exam config.
#[utoipa::path(
    post,
    path = "/api/admin/config",
    tag = "admin",
    security(("bearer" = [])),
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Updated exam config", body = ExamConfig),
        (status = 400, description = "Invalid value or stale expected_version"),
    )
)]
pub async fn update_config(
    State(pool): State<SqlitePool>,
    AppJson(payload): AppJson<UpdateConfigRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let config = ExamConfig::upsert(
        &pool,
        payload.cutoff,
        payload.duration_minutes,
        payload.expected_version,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to write exam config: {:?}", e);
        AppError::from(e)
    })?
    .ok_or(AppError::StateConflict(
        "Exam config was changed by someone else; reload and retry".to_string(),
    ))?;

    tracing::info!(
        cutoff = config.cutoff,
        duration_minutes = config.duration_minutes,
        version = config.version,
        "Exam config updated"
    );

    Ok(Json(config))
}

/// Lists every candidate with their attempt status.
#[utoipa::path(
    get,
    path = "/api/admin/results",
    tag = "admin",
    security(("bearer" = [])),
    responses((status = 200, description = "All candidates", body = ResultsResponse))
)]
pub async fn list_results(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, CandidateResult>(
        r#"
        SELECT id, name, email, phone, allowed, has_attempted, score, passed, submitted_at
        FROM candidates
        ORDER BY id
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list results: {:?}", e);
        AppError::from(e)
    })?;

    let appeared = users.iter().filter(|u| u.has_attempted).count();
    let total = users.len();

    Ok(Json(ResultsResponse {
        users,
        appeared,
        total,
    }))
}

/// Enables or disables a candidate's eligibility to log in.
#[utoipa::path(
    put,
    path = "/api/admin/candidates/{id}/eligibility",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Candidate id")),
    request_body = UpdateEligibilityRequest,
    responses(
        (status = 200, description = "Eligibility updated"),
        (status = 404, description = "Candidate not found"),
    )
)]
pub async fn update_eligibility(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateEligibilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE candidates SET allowed = ?, updated_at = ? WHERE id = ?")
        .bind(payload.allowed)
        .bind(Utc::now())
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update eligibility: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Candidate not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "id": id, "allowed": payload.allowed })))
}

/// Returns the attempt record of any candidate.
#[utoipa::path(
    get,
    path = "/api/admin/candidates/{id}/attempt",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Candidate id")),
    responses(
        (status = 200, description = "Attempt record", body = ExamAttempt),
        (status = 404, description = "No attempt for this candidate"),
    )
)]
pub async fn get_candidate_attempt(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = ExamAttempt::find_by_candidate(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Exam attempt not found".to_string()))?;

    Ok(Json(attempt))
}
