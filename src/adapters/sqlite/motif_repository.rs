//! SQLite implementation of the MotifRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::{MotifState, MotifTelemetry};
use crate::domain::ports::MotifRepository;

#[derive(Clone)]
pub struct SqliteMotifRepository {
    pool: SqlitePool,
}

impl SqliteMotifRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MotifRow {
    id: String,
    family: String,
    phi: f64,
    rho: f64,
    sr: f64,
    cr: f64,
    xr: f64,
    surprise: f64,
    sample_count: i64,
    parent_id: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MotifRow> for MotifState {
    type Error = WeaverError;

    fn try_from(row: MotifRow) -> Result<Self, Self::Error> {
        let parse_time = |s: &str| -> Result<DateTime<Utc>, WeaverError> {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| WeaverError::Serialization(e.to_string()))
        };

        Ok(MotifState {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| WeaverError::Serialization(e.to_string()))?,
            family: row.family,
            phi: row.phi,
            rho: row.rho,
            telemetry: MotifTelemetry {
                sr: row.sr,
                cr: row.cr,
                xr: row.xr,
                surprise: row.surprise,
                sample_count: usize::try_from(row.sample_count).unwrap_or(0),
            },
            parent_id: row
                .parent_id
                .map(|id| Uuid::parse_str(&id))
                .transpose()
                .map_err(|e| WeaverError::Serialization(e.to_string()))?,
            version: u64::try_from(row.version).unwrap_or(1),
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl MotifRepository for SqliteMotifRepository {
    async fn insert(&self, state: &MotifState) -> WeaverResult<()> {
        sqlx::query(
            r"INSERT INTO motif_states
              (id, family, phi, rho, sr, cr, xr, surprise, sample_count,
               parent_id, version, created_at, updated_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(state.id.to_string())
        .bind(&state.family)
        .bind(state.phi)
        .bind(state.rho)
        .bind(state.telemetry.sr)
        .bind(state.telemetry.cr)
        .bind(state.telemetry.xr)
        .bind(state.telemetry.surprise)
        .bind(i64::try_from(state.telemetry.sample_count).unwrap_or(0))
        .bind(state.parent_id.map(|id| id.to_string()))
        .bind(i64::try_from(state.version).unwrap_or(1))
        .bind(state.created_at.to_rfc3339())
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> WeaverResult<Option<MotifState>> {
        let row: Option<MotifRow> = sqlx::query_as("SELECT * FROM motif_states WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_family(&self, family: &str) -> WeaverResult<Option<MotifState>> {
        let row: Option<MotifRow> =
            sqlx::query_as("SELECT * FROM motif_states WHERE family = ?")
                .bind(family)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> WeaverResult<Vec<MotifState>> {
        let rows: Vec<MotifRow> =
            sqlx::query_as("SELECT * FROM motif_states ORDER BY family")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, state: &MotifState, expected_version: u64) -> WeaverResult<()> {
        let result = sqlx::query(
            r"UPDATE motif_states
              SET phi = ?, rho = ?, sr = ?, cr = ?, xr = ?, surprise = ?,
                  sample_count = ?, version = ?, updated_at = ?
              WHERE id = ? AND version = ?",
        )
        .bind(state.phi)
        .bind(state.rho)
        .bind(state.telemetry.sr)
        .bind(state.telemetry.cr)
        .bind(state.telemetry.xr)
        .bind(state.telemetry.surprise)
        .bind(i64::try_from(state.telemetry.sample_count).unwrap_or(0))
        .bind(i64::try_from(state.version).unwrap_or(1))
        .bind(state.updated_at.to_rfc3339())
        .bind(state.id.to_string())
        .bind(i64::try_from(expected_version).unwrap_or(0))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either the row is gone or another updater won the race.
            return Err(WeaverError::ConcurrencyConflict {
                entity: "motif_state".to_string(),
                id: state.id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_or_create(&self, family: &str) -> WeaverResult<MotifState> {
        if let Some(state) = self.get_by_family(family).await? {
            return Ok(state);
        }

        let state = MotifState::new(family);
        match self.insert(&state).await {
            Ok(()) => Ok(state),
            // Lost a creation race; the winner's row is authoritative.
            Err(WeaverError::Database(_)) => self
                .get_by_family(family)
                .await?
                .ok_or_else(|| WeaverError::MotifNotFound(family.to_string())),
            Err(e) => Err(e),
        }
    }
}
