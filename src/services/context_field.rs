//! Global context field: aggregates all active families into one bounded
//! scalar (theta) on a timer.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{MotifState, PHI_MAX};

/// Largest possible phi*rho*surprise product; used to normalize theta
/// into [0, 1].
const MAX_PRODUCT: f64 = PHI_MAX * 2.0 * 1.0;

/// Compute theta from the active families. Families with no telemetry
/// samples yet are excluded. The result is clamped: theta is used only
/// for cross-family normalization and must never diverge.
pub fn compute_theta(states: &[MotifState]) -> f64 {
    let products: Vec<f64> = states
        .iter()
        .filter(|s| s.telemetry.sample_count > 0)
        .map(MotifState::score)
        .collect();

    if products.is_empty() {
        return 0.0;
    }

    let mean = products.iter().sum::<f64>() / products.len() as f64;
    (mean / MAX_PRODUCT).clamp(0.0, 1.0)
}

/// Shared holder for the latest theta value.
#[derive(Clone, Default)]
pub struct ContextField {
    theta: Arc<RwLock<f64>>,
}

impl ContextField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute and store theta; returns the new value.
    pub async fn tick(&self, states: &[MotifState]) -> f64 {
        let theta = compute_theta(states);
        *self.theta.write().await = theta;
        theta
    }

    pub async fn theta(&self) -> f64 {
        *self.theta.read().await
    }
}
