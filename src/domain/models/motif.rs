//! Motif (pattern family) resonance state.
//!
//! Every pattern family gets one `MotifState` row the first time it
//! appears, at phi = 0 and rho = 1. Telemetry updates advance (phi, rho)
//! through bounded equations; states decay toward zero resonance but are
//! never deleted. Evolving a family into a variant creates a new state
//! with `parent_id` lineage, never mutating the parent in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rolling-window statistics feeding a resonance update. All rates are
/// in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotifTelemetry {
    /// Success rate over the window.
    pub sr: f64,
    /// Confirmation rate: fraction of outcomes with confidence > 0.7.
    pub cr: f64,
    /// Contradiction rate: fraction with strongly negative outcome.
    pub xr: f64,
    /// Rarity-based surprise rating.
    pub surprise: f64,
    /// Number of outcomes in the window.
    pub sample_count: usize,
}

/// Coefficients for the bounded resonance update equations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResonanceCoefficients {
    pub alpha: f64,
    pub gamma: f64,
    pub lambda1: f64,
    pub lambda2: f64,
    pub rho_min: f64,
    pub rho_max: f64,
}

impl Default for ResonanceCoefficients {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.1,
            lambda1: 0.3,
            lambda2: 0.5,
            rho_min: 0.1,
            rho_max: 2.0,
        }
    }
}

/// Hard bounds on phi, independent of coefficients.
pub const PHI_MIN: f64 = 0.0;
pub const PHI_MAX: f64 = 2.0;

/// Per pattern-family resonance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifState {
    /// Unique identifier
    pub id: Uuid,
    /// Family name, unique per lineage node.
    pub family: String,
    /// Resonance, in [0, 2].
    pub phi: f64,
    /// Feedback factor, in [rho_min, rho_max].
    pub rho: f64,
    /// Latest rolling-window telemetry.
    pub telemetry: MotifTelemetry,
    /// Lineage: the family this one was evolved from (weak reference).
    pub parent_id: Option<Uuid>,
    /// Version for optimistic locking
    pub version: u64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl MotifState {
    /// Create the state for a family seen for the first time.
    pub fn new(family: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            family: family.into(),
            phi: 0.0,
            rho: 1.0,
            telemetry: MotifTelemetry::default(),
            parent_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Spawn a variant of this family. The parent is left untouched; the
    /// variant starts from the parent's current resonance.
    pub fn evolve(&self, variant_family: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            family: variant_family.into(),
            phi: self.phi,
            rho: self.rho,
            telemetry: MotifTelemetry::default(),
            parent_id: Some(self.id),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance (phi, rho) from new telemetry.
    ///
    /// phi' = clamp(phi + alpha*(sr - xr) + lambda1*cr - lambda2*cr*xr, 0, 2)
    /// rho' = clamp(rho + gamma*(surprise - 0.5), rho_min, rho_max)
    ///
    /// The re-clamp after every update is the guardrail against unbounded
    /// resonance growth, regardless of input magnitude.
    pub fn apply_telemetry(&mut self, telemetry: MotifTelemetry, coeffs: &ResonanceCoefficients) {
        let MotifTelemetry { sr, cr, xr, surprise, .. } = telemetry;

        let phi = self.phi + coeffs.alpha * (sr - xr) + coeffs.lambda1 * cr
            - coeffs.lambda2 * cr * xr;
        let rho = self.rho + coeffs.gamma * (surprise - 0.5);

        self.phi = phi.clamp(PHI_MIN, PHI_MAX);
        self.rho = rho.clamp(coeffs.rho_min, coeffs.rho_max);
        self.telemetry = telemetry;
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Priority score used by queue ordering.
    pub fn score(&self) -> f64 {
        self.phi * self.rho * self.telemetry.surprise
    }
}
