//! SQLite implementation of the PredictionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::{
    PatternDescriptor, PredictionOutcome, PredictionRecord, PredictionStatus,
};
use crate::domain::ports::PredictionRepository;

#[derive(Clone)]
pub struct SqlitePredictionRepository {
    pool: SqlitePool,
}

impl SqlitePredictionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PredictionRow {
    id: String,
    symbol: String,
    timeframe: String,
    entry_price: f64,
    target_price: f64,
    stop_loss: f64,
    max_time_minutes: i64,
    pattern: String,
    status: String,
    current_price: Option<f64>,
    max_drawdown: f64,
    outcome: Option<String>,
    final_price: Option<f64>,
    final_at: Option<String>,
    created_at: String,
    version: i64,
}

impl TryFrom<PredictionRow> for PredictionRecord {
    type Error = WeaverError;

    fn try_from(row: PredictionRow) -> Result<Self, Self::Error> {
        let parse_time = |s: &str| -> Result<DateTime<Utc>, WeaverError> {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| WeaverError::Serialization(e.to_string()))
        };

        let pattern: PatternDescriptor = serde_json::from_str(&row.pattern)?;
        let status = PredictionStatus::from_str(&row.status).ok_or_else(|| {
            WeaverError::Serialization(format!("unknown prediction status: {}", row.status))
        })?;
        let outcome = row
            .outcome
            .as_deref()
            .map(|o| {
                PredictionOutcome::from_str(o).ok_or_else(|| {
                    WeaverError::Serialization(format!("unknown prediction outcome: {o}"))
                })
            })
            .transpose()?;

        Ok(PredictionRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| WeaverError::Serialization(e.to_string()))?,
            symbol: row.symbol,
            timeframe: row.timeframe,
            entry_price: row.entry_price,
            target_price: row.target_price,
            stop_loss: row.stop_loss,
            max_time_minutes: row.max_time_minutes,
            pattern,
            status,
            current_price: row.current_price,
            max_drawdown: row.max_drawdown,
            outcome,
            final_price: row.final_price,
            final_at: row.final_at.as_deref().map(parse_time).transpose()?,
            created_at: parse_time(&row.created_at)?,
            version: u64::try_from(row.version).unwrap_or(1),
        })
    }
}

#[async_trait]
impl PredictionRepository for SqlitePredictionRepository {
    async fn insert(&self, record: &PredictionRecord) -> WeaverResult<()> {
        let pattern_json = serde_json::to_string(&record.pattern)?;

        sqlx::query(
            r"INSERT INTO predictions
              (id, symbol, timeframe, entry_price, target_price, stop_loss,
               max_time_minutes, pattern, status, current_price, max_drawdown,
               outcome, final_price, final_at, created_at, version)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.symbol)
        .bind(&record.timeframe)
        .bind(record.entry_price)
        .bind(record.target_price)
        .bind(record.stop_loss)
        .bind(record.max_time_minutes)
        .bind(&pattern_json)
        .bind(record.status.as_str())
        .bind(record.current_price)
        .bind(record.max_drawdown)
        .bind(record.outcome.map(|o| o.as_str()))
        .bind(record.final_price)
        .bind(record.final_at.map(|t| t.to_rfc3339()))
        .bind(record.created_at.to_rfc3339())
        .bind(i64::try_from(record.version).unwrap_or(1))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> WeaverResult<Option<PredictionRecord>> {
        let row: Option<PredictionRow> =
            sqlx::query_as("SELECT * FROM predictions WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, record: &PredictionRecord, expected_version: u64) -> WeaverResult<()> {
        let result = sqlx::query(
            r"UPDATE predictions
              SET status = ?, current_price = ?, max_drawdown = ?, outcome = ?,
                  final_price = ?, final_at = ?, version = ?
              WHERE id = ? AND version = ?",
        )
        .bind(record.status.as_str())
        .bind(record.current_price)
        .bind(record.max_drawdown)
        .bind(record.outcome.map(|o| o.as_str()))
        .bind(record.final_price)
        .bind(record.final_at.map(|t| t.to_rfc3339()))
        .bind(i64::try_from(record.version).unwrap_or(1))
        .bind(record.id.to_string())
        .bind(i64::try_from(expected_version).unwrap_or(0))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WeaverError::ConcurrencyConflict {
                entity: "prediction".to_string(),
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_active(&self) -> WeaverResult<Vec<PredictionRecord>> {
        self.list_by_status(PredictionStatus::Active).await
    }

    async fn list_by_status(
        &self,
        status: PredictionStatus,
    ) -> WeaverResult<Vec<PredictionRecord>> {
        let rows: Vec<PredictionRow> = sqlx::query_as(
            "SELECT * FROM predictions WHERE status = ? ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
