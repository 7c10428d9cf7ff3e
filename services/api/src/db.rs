//! Data Access Layer
//!
//! Postgres-backed training recorder. Each finished dialogue is one row; the
//! full record is stored as JSONB next to the columns the queries filter on.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::recorder::{RecordError, TrainingRecord, TrainingRecorder};
use sqlx::{PgPool, types::Json};

/// A wrapper around the `PgPool` implementing [`TrainingRecorder`].
#[derive(Clone)]
pub struct PgRecorder {
    pool: PgPool,
}

fn unavailable(err: sqlx::Error) -> RecordError {
    RecordError::Unavailable(err.to_string())
}

impl PgRecorder {
    /// Creates a new `PgRecorder` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TrainingRecorder for PgRecorder {
    async fn record(&self, record: TrainingRecord) -> Result<(), RecordError> {
        let payload = serde_json::to_value(&record)?;
        sqlx::query(
            r#"
            INSERT INTO training_records
                (session_id, trainee_id, topic, total_score, started_at, ended_at, record)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.session_id.as_str())
        .bind(record.trainee_id.as_str())
        .bind(record.topic.as_str())
        .bind(i16::from(record.evaluation.total_score))
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn history(
        &self,
        trainee_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrainingRecord>, RecordError> {
        let rows: Vec<(Json<TrainingRecord>,)> = sqlx::query_as(
            r#"
            SELECT record
            FROM training_records
            WHERE trainee_id = $1 AND ended_at >= $2
            ORDER BY ended_at ASC
            "#,
        )
        .bind(trainee_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(rows.into_iter().map(|(Json(record),)| record).collect())
    }

    async fn all_since(&self, since: DateTime<Utc>) -> Result<Vec<TrainingRecord>, RecordError> {
        let rows: Vec<(Json<TrainingRecord>,)> = sqlx::query_as(
            r#"
            SELECT record
            FROM training_records
            WHERE ended_at >= $1
            ORDER BY ended_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(rows.into_iter().map(|(Json(record),)| record).collect())
    }
}
