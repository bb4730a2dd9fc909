//! Repository port for prediction records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::WeaverResult;
use crate::domain::models::{PredictionRecord, PredictionStatus};

/// Repository port for prediction lifecycle records. Records are
/// finalized in place, never deleted.
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    async fn insert(&self, record: &PredictionRecord) -> WeaverResult<()>;

    async fn get(&self, id: Uuid) -> WeaverResult<Option<PredictionRecord>>;

    /// Write back a record read at `expected_version`; fails with
    /// `ConcurrencyConflict` on a stale version.
    async fn update(&self, record: &PredictionRecord, expected_version: u64) -> WeaverResult<()>;

    /// All records still being polled.
    async fn list_active(&self) -> WeaverResult<Vec<PredictionRecord>>;

    async fn list_by_status(&self, status: PredictionStatus) -> WeaverResult<Vec<PredictionRecord>>;
}
