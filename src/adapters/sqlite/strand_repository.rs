//! SQLite implementation of the StrandRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::{
    ClusterAssignment, ClusterDimension, Strand, StrandKind, StrandPayload,
};
use crate::domain::ports::{StrandFilters, StrandRepository};

#[derive(Clone)]
pub struct SqliteStrandRepository {
    pool: SqlitePool,
}

impl SqliteStrandRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_assignments(&self, strand_id: Uuid) -> WeaverResult<Vec<ClusterAssignment>> {
        let rows: Vec<(String, String, i64, i64)> = sqlx::query_as(
            "SELECT dimension, cluster_key, braid_level, consumed
             FROM strand_assignments WHERE strand_id = ?
             ORDER BY dimension",
        )
        .bind(strand_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut assignments = Vec::with_capacity(rows.len());
        for (dimension, cluster_key, braid_level, consumed) in rows {
            let dimension = ClusterDimension::from_str(&dimension).ok_or_else(|| {
                WeaverError::Serialization(format!("unknown cluster dimension: {dimension}"))
            })?;
            assignments.push(ClusterAssignment {
                dimension,
                cluster_key,
                braid_level: u32::try_from(braid_level)
                    .map_err(|e| WeaverError::Serialization(e.to_string()))?,
                consumed: consumed != 0,
            });
        }
        Ok(assignments)
    }

    async fn load_sources(&self, braid_id: Uuid) -> WeaverResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT source_id FROM strand_sources WHERE braid_id = ? ORDER BY source_id",
        )
        .bind(braid_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id,)| {
                Uuid::parse_str(&id).map_err(|e| WeaverError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn hydrate(&self, row: &SqliteRow) -> WeaverResult<Strand> {
        let id: String = row.try_get("id").map_err(WeaverError::from)?;
        let id = Uuid::parse_str(&id).map_err(|e| WeaverError::Serialization(e.to_string()))?;
        let braid_level: i64 = row.try_get("braid_level").map_err(WeaverError::from)?;
        let payload: String = row.try_get("payload").map_err(WeaverError::from)?;
        let payload: StrandPayload = serde_json::from_str(&payload)?;
        let lesson: Option<String> = row.try_get("lesson").map_err(WeaverError::from)?;
        let created_at: String = row.try_get("created_at").map_err(WeaverError::from)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| WeaverError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(Strand {
            id,
            braid_level: u32::try_from(braid_level)
                .map_err(|e| WeaverError::Serialization(e.to_string()))?,
            created_at,
            payload,
            cluster_assignments: self.load_assignments(id).await?,
            lesson,
            source_strand_ids: self.load_sources(id).await?,
        })
    }
}

/// Family column extracted at insert so rarity queries stay indexable.
fn motif_family_of(payload: &StrandPayload) -> Option<String> {
    match payload {
        StrandPayload::Motif { family, .. } => Some(family.clone()),
        _ => payload.pattern().and_then(|p| p.motif_family.clone()),
    }
}

async fn insert_strand_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    strand: &Strand,
) -> WeaverResult<()> {
    let payload_json = serde_json::to_string(&strand.payload)?;

    let result = sqlx::query(
        r"INSERT INTO strands (id, kind, braid_level, payload, lesson, motif_family, created_at)
          VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(strand.id.to_string())
    .bind(strand.kind().as_str())
    .bind(i64::from(strand.braid_level))
    .bind(&payload_json)
    .bind(&strand.lesson)
    .bind(motif_family_of(&strand.payload))
    .bind(strand.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await;

    if let Err(sqlx::Error::Database(ref db_err)) = result {
        if db_err.is_unique_violation() {
            return Err(WeaverError::DuplicateBraid {
                braid_id: strand.id,
                cluster_key: String::new(),
            });
        }
    }
    result?;

    for assignment in &strand.cluster_assignments {
        sqlx::query(
            r"INSERT INTO strand_assignments (strand_id, dimension, cluster_key, braid_level, consumed)
              VALUES (?, ?, ?, ?, ?)",
        )
        .bind(strand.id.to_string())
        .bind(assignment.dimension.as_str())
        .bind(&assignment.cluster_key)
        .bind(i64::from(assignment.braid_level))
        .bind(i64::from(assignment.consumed))
        .execute(&mut **tx)
        .await?;
    }

    for source_id in &strand.source_strand_ids {
        sqlx::query("INSERT INTO strand_sources (braid_id, source_id) VALUES (?, ?)")
            .bind(strand.id.to_string())
            .bind(source_id.to_string())
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

async fn consume_sources_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    source_ids: &[Uuid],
    dimension: ClusterDimension,
    source_level: u32,
) -> WeaverResult<()> {
    for source_id in source_ids {
        sqlx::query(
            r"UPDATE strand_assignments SET consumed = 1
              WHERE strand_id = ? AND dimension = ? AND braid_level = ?",
        )
        .bind(source_id.to_string())
        .bind(dimension.as_str())
        .bind(i64::from(source_level))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl StrandRepository for SqliteStrandRepository {
    async fn insert(&self, strand: &Strand) -> WeaverResult<()> {
        strand
            .validate()
            .map_err(WeaverError::ValidationFailed)?;

        let mut tx = self.pool.begin().await?;
        insert_strand_tx(&mut tx, strand).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> WeaverResult<Option<Strand>> {
        let row = sqlx::query("SELECT * FROM strands WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn query(&self, filters: StrandFilters) -> WeaverResult<Vec<Strand>> {
        let mut sql = String::from("SELECT s.* FROM strands s");
        let mut bindings: Vec<String> = Vec::new();

        if let (Some(dimension), Some(key)) = (filters.cluster_dimension, &filters.cluster_key) {
            sql.push_str(
                " JOIN strand_assignments a ON a.strand_id = s.id \
                 AND a.dimension = ? AND a.cluster_key = ? AND a.braid_level = s.braid_level",
            );
            bindings.push(dimension.as_str().to_string());
            bindings.push(key.clone());
        }

        sql.push_str(" WHERE 1=1");
        if let Some(kind) = filters.kind {
            sql.push_str(" AND s.kind = ?");
            bindings.push(kind.as_str().to_string());
        }
        if let Some(level) = filters.braid_level {
            sql.push_str(" AND s.braid_level = ?");
            bindings.push(level.to_string());
        }
        if let Some(after) = filters.created_after {
            sql.push_str(" AND s.created_at > ?");
            bindings.push(after.to_rfc3339());
        }

        sql.push_str(" ORDER BY s.created_at ASC");
        if let Some(limit) = filters.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql);
        for binding in &bindings {
            query = query.bind(binding);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut strands = Vec::with_capacity(rows.len());
        for row in &rows {
            strands.push(self.hydrate(row).await?);
        }
        Ok(strands)
    }

    async fn set_assignment_consumed(
        &self,
        strand_id: Uuid,
        dimension: ClusterDimension,
        braid_level: u32,
    ) -> WeaverResult<()> {
        let result = sqlx::query(
            r"UPDATE strand_assignments SET consumed = 1
              WHERE strand_id = ? AND dimension = ? AND braid_level = ?",
        )
        .bind(strand_id.to_string())
        .bind(dimension.as_str())
        .bind(i64::from(braid_level))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WeaverError::StrandNotFound(strand_id));
        }
        Ok(())
    }

    async fn insert_braid_with_consumption(
        &self,
        braid: &Strand,
        dimension: ClusterDimension,
        source_level: u32,
    ) -> WeaverResult<bool> {
        braid
            .validate()
            .map_err(WeaverError::ValidationFailed)?;

        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM strands WHERE id = ?")
            .bind(braid.id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            // A previous pass created this braid; repair any consumption
            // marking lost between creation and commit.
            consume_sources_tx(&mut tx, &braid.source_strand_ids, dimension, source_level)
                .await?;
            tx.commit().await?;
            return Ok(false);
        }

        insert_strand_tx(&mut tx, braid).await?;
        consume_sources_tx(&mut tx, &braid.source_strand_ids, dimension, source_level).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn count_family_occurrences(
        &self,
        family: &str,
        after: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> WeaverResult<u64> {
        let count: (i64,) = match exclude {
            Some(id) => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM strands
                     WHERE motif_family = ? AND created_at > ? AND id != ?",
                )
                .bind(family)
                .bind(after.to_rfc3339())
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM strands WHERE motif_family = ? AND created_at > ?",
                )
                .bind(family)
                .bind(after.to_rfc3339())
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(u64::try_from(count.0).unwrap_or(0))
    }
}
