// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::candidate::{CANDIDATE_COLUMNS, Candidate},
    state::AppState,
};

pub const ROLE_CANDIDATE: &str = "candidate";
pub const ROLE_ADMIN: &str = "admin";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject: the candidate id, or `"admin"` for admin tokens.
    pub sub: String,
    /// Either `candidate` or `admin`.
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a new JWT expiring `expiration_seconds` from now.
pub fn sign_jwt(
    subject: &str,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: subject.to_owned(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies signature and expiry of a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(req: &Request<Body>) -> Result<&str, AppError> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::AuthError("No token provided".to_string()))
}

/// Axum Middleware: candidate authentication.
///
/// Validates the bearer token, requires the `candidate` role, then loads the
/// candidate row and injects it into the request extensions. Any failure,
/// including a candidate deleted after the token was issued, is a 401.
pub async fn candidate_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify_jwt(bearer_token(&req)?, &state.config.jwt_secret)?;

    if claims.role != ROLE_CANDIDATE {
        return Err(AppError::AuthError("Invalid token".to_string()));
    }

    let candidate_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    let candidate = find_candidate(&state.pool, candidate_id)
        .await?
        .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;

    req.extensions_mut().insert(candidate);
    Ok(next.run(req).await)
}

async fn find_candidate(pool: &SqlitePool, id: i64) -> Result<Option<Candidate>, AppError> {
    let candidate = sqlx::query_as::<_, Candidate>(&format!(
        "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to resolve token candidate: {:?}", e);
        AppError::from(e)
    })?;

    Ok(candidate)
}

/// Axum Middleware: admin authorization.
///
/// Missing or invalid tokens are a 401; a valid token without the `admin`
/// role is a 403.
pub async fn admin_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify_jwt(bearer_token(&req)?, &config.jwt_secret)?;

    if claims.role != ROLE_ADMIN {
        return Err(AppError::Forbidden(
            "Forbidden: admin access required".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trips_subject_and_role() {
        let token = sign_jwt("42", ROLE_CANDIDATE, SECRET, 60).unwrap();
        let claims = verify_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, ROLE_CANDIDATE);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = sign_jwt("42", ROLE_ADMIN, "another-secret", 60).unwrap();
        assert!(matches!(
            verify_jwt(&token, SECRET),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let past = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize
            - 10;
        let claims = Claims {
            sub: "7".into(),
            role: ROLE_CANDIDATE.into(),
            exp: past,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify_jwt(&token, SECRET).is_err());
    }
}
