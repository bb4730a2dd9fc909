//! Resonance updater: advances per-family (phi, rho) from telemetry
//! through the bounded update equations.
//!
//! Motif state is shared between independent updaters, so every write
//! goes through an optimistic version check. On conflict the whole
//! read-modify-write is retried against the fresh row; a concurrent
//! update is never silently overwritten, since that could smuggle an
//! unclamped value past the guardrails.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::{MotifState, MotifTelemetry, ResonanceCoefficients};
use crate::domain::ports::MotifRepository;

/// Attempts before giving up on a contended family.
const MAX_CONFLICT_RETRIES: u32 = 5;

pub struct ResonanceUpdater {
    motifs: Arc<dyn MotifRepository>,
    coefficients: ResonanceCoefficients,
}

impl ResonanceUpdater {
    pub fn new(motifs: Arc<dyn MotifRepository>, coefficients: ResonanceCoefficients) -> Self {
        Self { motifs, coefficients }
    }

    /// Apply one telemetry observation to a family, creating the state at
    /// phi=0, rho=1 on first appearance. Returns the stored state.
    #[instrument(skip(self, telemetry), fields(family))]
    pub async fn apply(
        &self,
        family: &str,
        telemetry: MotifTelemetry,
    ) -> WeaverResult<MotifState> {
        for attempt in 0..MAX_CONFLICT_RETRIES {
            let mut state = self.motifs.get_or_create(family).await?;
            let expected_version = state.version;

            state.apply_telemetry(telemetry, &self.coefficients);

            match self.motifs.update(&state, expected_version).await {
                Ok(()) => {
                    debug!(
                        family,
                        phi = state.phi,
                        rho = state.rho,
                        "resonance state advanced"
                    );
                    return Ok(state);
                }
                Err(WeaverError::ConcurrencyConflict { .. }) => {
                    warn!(family, attempt, "motif version conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(WeaverError::ConcurrencyConflict {
            entity: "motif_state".to_string(),
            id: family.to_string(),
        })
    }

    /// Spawn a variant family from a parent, preserving the parent
    /// unchanged. The variant carries `parent_id` lineage.
    pub async fn evolve(&self, parent_family: &str, variant_family: &str) -> WeaverResult<MotifState> {
        let parent = self
            .motifs
            .get_by_family(parent_family)
            .await?
            .ok_or_else(|| WeaverError::MotifNotFound(parent_family.to_string()))?;

        let variant = parent.evolve(variant_family);
        self.motifs.insert(&variant).await?;
        Ok(variant)
    }

    pub fn coefficients(&self) -> &ResonanceCoefficients {
        &self.coefficients
    }
}
