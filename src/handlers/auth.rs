// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, AppJson},
    models::candidate::{CANDIDATE_COLUMNS, Candidate, LoginRequest, LoginResponse},
    utils::jwt::{ROLE_CANDIDATE, sign_jwt},
};

/// Authenticates a candidate by roster email and phone.
///
/// The candidate must already exist (uploaded by an admin) and be eligible.
/// Returns a Bearer token bound to the candidate id.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Email or phone missing"),
        (status = 401, description = "Not on the roster"),
        (status = 403, description = "On the roster but not eligible"),
    )
)]
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = LoginRequest {
        email: payload.email.trim().to_string(),
        phone: payload.phone.trim().to_string(),
    };
    payload.validate()?;

    let candidate = sqlx::query_as::<_, Candidate>(&format!(
        "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE email = ? AND phone = ?"
    ))
    .bind(&payload.email)
    .bind(&payload.phone)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?;

    let candidate = candidate.ok_or(AppError::AuthError(
        "You are not authorized for this exam.".to_string(),
    ))?;

    if !candidate.allowed {
        tracing::info!(candidate_id = candidate.id, "Rejected login for ineligible candidate");
        return Err(AppError::Forbidden(
            "You are not allowed to take this exam.".to_string(),
        ));
    }

    let token = sign_jwt(
        &candidate.id.to_string(),
        ROLE_CANDIDATE,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    tracing::info!(candidate_id = candidate.id, "Candidate logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        candidate: candidate.into(),
    }))
}
