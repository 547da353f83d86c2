// src/models/exam_config.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use utoipa::ToSchema;
use validator::Validate;

use crate::config::{DEFAULT_CUTOFF, DEFAULT_DURATION_MINUTES};

/// The singleton 'exam_config' row. `version` increases on every write.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ExamConfig {
    /// Minimum number of correct answers needed to pass.
    pub cutoff: i64,
    pub duration_minutes: i64,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// DTO for writing the config. Omitted duration keeps the current value.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateConfigRequest {
    #[validate(range(min = 0, message = "cutoff must be a non-negative integer"))]
    pub cutoff: i64,
    #[validate(range(min = 1, max = 1440, message = "duration_minutes must be between 1 and 1440"))]
    pub duration_minutes: Option<i64>,
    /// When set, the write only succeeds if the stored version still matches
    /// (0 while no config has been written yet).
    pub expected_version: Option<i64>,
}

const CONFIG_COLUMNS: &str = "cutoff, duration_minutes, version, updated_at";

impl ExamConfig {
    /// Reads the config row, inserting the defaults first if it does not exist yet.
    ///
    /// Only the first call writes; later calls are a plain read.
    pub async fn load_or_init(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        if let Some(config) = Self::find(pool).await? {
            return Ok(config);
        }

        sqlx::query(
            r#"
            INSERT INTO exam_config (id, cutoff, duration_minutes, version, updated_at)
            VALUES (1, ?, ?, 1, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(DEFAULT_CUTOFF)
        .bind(DEFAULT_DURATION_MINUTES)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Self::find(pool).await?.ok_or(sqlx::Error::RowNotFound)
    }

    async fn find<'e, E>(executor: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ExamConfig>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM exam_config WHERE id = 1"
        ))
        .fetch_optional(executor)
        .await
    }

    /// Writes cutoff and duration and bumps the version.
    ///
    /// Returns `None` when `expected_version` is given and does not match the
    /// stored version. Before the first write the stored version counts as 0.
    pub async fn upsert<'e, E>(
        executor: E,
        cutoff: i64,
        duration_minutes: Option<i64>,
        expected_version: Option<i64>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ExamConfig>(&format!(
            r#"
            INSERT INTO exam_config (id, cutoff, duration_minutes, version, updated_at)
            SELECT 1, ?1, COALESCE(?2, ?3), 1, ?4
            WHERE ?5 IS NULL OR ?5 = 0 OR EXISTS (SELECT 1 FROM exam_config WHERE id = 1)
            ON CONFLICT(id) DO UPDATE SET
                cutoff = excluded.cutoff,
                duration_minutes = COALESCE(?2, exam_config.duration_minutes),
                version = exam_config.version + 1,
                updated_at = excluded.updated_at
            WHERE ?5 IS NULL OR exam_config.version = ?5
            RETURNING {CONFIG_COLUMNS}
            "#
        ))
        .bind(cutoff)
        .bind(duration_minutes)
        .bind(DEFAULT_DURATION_MINUTES)
        .bind(Utc::now())
        .bind(expected_version)
        .fetch_optional(executor)
        .await
    }
}
