// src/config.rs

use std::{env, fmt};

use dotenvy::dotenv;

use crate::utils::hash::hash_secret;

/// Number of questions served per exam paper.
pub const EXAM_QUESTION_COUNT: i64 = 10;

/// Defaults used when the exam config row is created lazily.
pub const DEFAULT_CUTOFF: i64 = 0;
pub const DEFAULT_DURATION_MINUTES: i64 = 20;

/// Candidate tokens live for two hours unless overridden.
pub const DEFAULT_JWT_EXPIRATION: u64 = 2 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    /// Argon2 hash of `ADMIN_SECRET`. The plain secret is never kept.
    pub admin_secret_hash: String,
    pub rust_log: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://exam.db?mode=rwc".to_string());

        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION)?;

        let admin_secret = required("ADMIN_SECRET")?;
        let admin_secret_hash = hash_secret(&admin_secret)
            .map_err(|e| ConfigError(format!("failed to hash ADMIN_SECRET: {}", e)))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = parsed("PORT", 5000)?;

        let allowed_origins = parse_origins(env::var("CLIENT_URLS").ok().as_deref());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            admin_secret_hash,
            rust_log,
            port,
            allowed_origins,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError(format!("{} must be set", name)))
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError(format!("invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

/// Splits a comma-separated origin list, falling back to the local dev client.
fn parse_origins(raw: Option<&str>) -> Vec<String> {
    let mut origins: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() {
        origins.push("http://localhost:5173".to_string());
    }
    origins.dedup();
    origins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_default_to_dev_client() {
        assert_eq!(parse_origins(None), vec!["http://localhost:5173"]);
        assert_eq!(parse_origins(Some(" , ")), vec!["http://localhost:5173"]);
    }

    #[test]
    fn origins_are_trimmed() {
        let origins = parse_origins(Some("https://a.example, https://b.example ,"));
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }
}
