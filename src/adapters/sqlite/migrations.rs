//! SQLite database migration management.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub sql: String,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all migrations for this crate.
    pub async fn run(&self) -> Result<usize, MigrationError> {
        self.run_embedded_migrations(all_migrations()).await
    }

    pub async fn run_embedded_migrations(
        &self,
        migrations: Vec<Migration>,
    ) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<_> = migrations
            .into_iter()
            .filter(|m| m.version > current_version)
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        for migration in &pending {
            self.apply_migration(migration).await?;
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
        Ok(())
    }

    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let result: Option<(i64,)> =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_optional(&self.pool)
                .await
                .map_err(MigrationError::VersionCheckError)?;
        Ok(result.map(|(v,)| v).unwrap_or(0))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        sqlx::raw_sql(&migration.sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;
        Ok(())
    }
}

/// Embedded migrations, in order.
pub fn all_migrations() -> Vec<Migration> {
    vec![initial_schema_migration()]
}

pub fn initial_schema_migration() -> Migration {
    Migration {
        version: 1,
        description: "Initial schema".to_string(),
        sql: r"
CREATE TABLE strands (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    braid_level INTEGER NOT NULL,
    payload TEXT NOT NULL,
    lesson TEXT,
    motif_family TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX idx_strands_kind_level ON strands(kind, braid_level);
CREATE INDEX idx_strands_family_created ON strands(motif_family, created_at);

CREATE TABLE strand_assignments (
    strand_id TEXT NOT NULL REFERENCES strands(id),
    dimension TEXT NOT NULL,
    cluster_key TEXT NOT NULL,
    braid_level INTEGER NOT NULL,
    consumed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (strand_id, dimension, braid_level)
);
CREATE INDEX idx_assignments_cluster
    ON strand_assignments(dimension, cluster_key, braid_level);

CREATE TABLE strand_sources (
    braid_id TEXT NOT NULL REFERENCES strands(id),
    source_id TEXT NOT NULL,
    PRIMARY KEY (braid_id, source_id)
);

CREATE TABLE motif_states (
    id TEXT PRIMARY KEY,
    family TEXT NOT NULL UNIQUE,
    phi REAL NOT NULL,
    rho REAL NOT NULL,
    sr REAL NOT NULL DEFAULT 0,
    cr REAL NOT NULL DEFAULT 0,
    xr REAL NOT NULL DEFAULT 0,
    surprise REAL NOT NULL DEFAULT 0,
    sample_count INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE predictions (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    entry_price REAL NOT NULL,
    target_price REAL NOT NULL,
    stop_loss REAL NOT NULL,
    max_time_minutes INTEGER NOT NULL,
    pattern TEXT NOT NULL,
    status TEXT NOT NULL,
    current_price REAL,
    max_drawdown REAL NOT NULL DEFAULT 0,
    outcome TEXT,
    final_price REAL,
    final_at TEXT,
    created_at TEXT NOT NULL,
    version INTEGER NOT NULL
);
CREATE INDEX idx_predictions_status ON predictions(status);
"
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;

    #[tokio::test]
    async fn test_migrations_apply_once() {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool.clone());

        let applied = migrator.run().await.unwrap();
        assert_eq!(applied, 1);
        assert_eq!(migrator.get_current_version().await.unwrap(), 1);

        // Re-running is a no-op.
        let applied = migrator.run().await.unwrap();
        assert_eq!(applied, 0);
    }
}
