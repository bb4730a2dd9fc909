//! Repository port for motif resonance state.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::WeaverResult;
use crate::domain::models::MotifState;

/// Repository port for per-family resonance state.
///
/// Motif state is the only resource mutated by multiple independent
/// updaters, so every write is guarded by an optimistic version check:
/// `update` must fail with `WeaverError::ConcurrencyConflict` when the
/// stored version no longer matches `expected_version`, never silently
/// overwrite.
#[async_trait]
pub trait MotifRepository: Send + Sync {
    /// Insert a new family state. Fails on duplicate family name.
    async fn insert(&self, state: &MotifState) -> WeaverResult<()>;

    async fn get(&self, id: Uuid) -> WeaverResult<Option<MotifState>>;

    async fn get_by_family(&self, family: &str) -> WeaverResult<Option<MotifState>>;

    /// All families, for context-field aggregation and queue ordering.
    async fn list(&self) -> WeaverResult<Vec<MotifState>>;

    /// Write back a state read at `expected_version`.
    async fn update(&self, state: &MotifState, expected_version: u64) -> WeaverResult<()>;

    /// Fetch the state for a family, creating it at phi=0, rho=1 on first
    /// appearance.
    async fn get_or_create(&self, family: &str) -> WeaverResult<MotifState>;
}
