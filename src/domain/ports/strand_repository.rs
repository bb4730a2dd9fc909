//! Repository port for strand persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::WeaverResult;
use crate::domain::models::{ClusterDimension, Strand, StrandKind};

/// Filters for querying strands.
#[derive(Debug, Clone, Default)]
pub struct StrandFilters {
    pub kind: Option<StrandKind>,
    pub braid_level: Option<u32>,
    pub cluster_dimension: Option<ClusterDimension>,
    pub cluster_key: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl StrandFilters {
    pub fn kind(mut self, kind: StrandKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn braid_level(mut self, level: u32) -> Self {
        self.braid_level = Some(level);
        self
    }

    pub fn cluster(mut self, dimension: ClusterDimension, key: impl Into<String>) -> Self {
        self.cluster_dimension = Some(dimension);
        self.cluster_key = Some(key.into());
        self
    }

    pub fn created_after(mut self, after: DateTime<Utc>) -> Self {
        self.created_after = Some(after);
        self
    }

    /// Cap the result set (oldest first, matching the query ordering).
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Repository port for strand persistence. Strands are append-only: there
/// is deliberately no delete, and the only mutation is the consumption
/// flag on a single cluster assignment.
#[async_trait]
pub trait StrandRepository: Send + Sync {
    /// Insert a new strand with its cluster assignments.
    async fn insert(&self, strand: &Strand) -> WeaverResult<()>;

    /// Get a strand by id.
    async fn get(&self, id: Uuid) -> WeaverResult<Option<Strand>>;

    /// List strands matching the filters.
    async fn query(&self, filters: StrandFilters) -> WeaverResult<Vec<Strand>>;

    /// Mark one strand's assignment for one dimension/level as consumed.
    /// Assignments for other dimensions on the same strand are untouched.
    async fn set_assignment_consumed(
        &self,
        strand_id: Uuid,
        dimension: ClusterDimension,
        braid_level: u32,
    ) -> WeaverResult<()>;

    /// Insert a braid and mark its sources consumed for `dimension` as one
    /// logical unit. Returns `false` without writing anything when a braid
    /// with the same id already exists (idempotent re-run), after
    /// repairing any source whose consumption marking was lost to a crash.
    async fn insert_braid_with_consumption(
        &self,
        braid: &Strand,
        dimension: ClusterDimension,
        source_level: u32,
    ) -> WeaverResult<bool>;

    /// Count strands of a family created after `after`, excluding one
    /// strand (rarity lookups for the surprise rating).
    async fn count_family_occurrences(
        &self,
        family: &str,
        after: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> WeaverResult<u64>;
}
