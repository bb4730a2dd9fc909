//! Telemetry updater: rolling-window success/confirmation/contradiction
//! rates and the rarity-based surprise rating per pattern family.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::WeaverResult;
use crate::domain::models::{MotifTelemetry, ResonanceConfig, Strand, StrandKind};
use crate::domain::ports::{StrandFilters, StrandRepository};

/// Stepwise rarity rating from occurrence counts in the window.
pub fn surprise_from_occurrences(occurrences: u64) -> f64 {
    match occurrences {
        0 => 1.0,
        1..=4 => 0.8,
        5..=9 => 0.6,
        10..=19 => 0.4,
        _ => 0.2,
    }
}

pub struct TelemetryUpdater {
    strands: Arc<dyn StrandRepository>,
    config: ResonanceConfig,
}

impl TelemetryUpdater {
    pub fn new(strands: Arc<dyn StrandRepository>, config: ResonanceConfig) -> Self {
        Self { strands, config }
    }

    fn is_contradiction(&self, strand: &Strand) -> bool {
        let Some(metrics) = strand.payload.metrics() else {
            return false;
        };
        if metrics
            .return_pct
            .is_some_and(|r| r < self.config.contradiction_return_threshold)
        {
            return true;
        }
        metrics.success == Some(false)
            && metrics
                .max_drawdown
                .is_some_and(|d| d > crate::domain::models::MAX_DRAWDOWN_LIMIT)
    }

    /// Recompute telemetry for one family over the rolling window.
    ///
    /// Returns `None` when the window holds fewer than `min_samples`
    /// outcomes; callers leave the stored state untouched in that case.
    pub async fn compute(&self, family: &str) -> WeaverResult<Option<MotifTelemetry>> {
        let window_start = Utc::now() - Duration::hours(self.config.window_hours);

        let reviews: Vec<Strand> = self
            .strands
            .query(
                StrandFilters::default()
                    .kind(StrandKind::PredictionReview)
                    .created_after(window_start),
            )
            .await?
            .into_iter()
            .filter(|s| {
                s.payload
                    .pattern()
                    .and_then(|p| p.motif_family.as_deref())
                    == Some(family)
            })
            .collect();

        if reviews.len() < self.config.min_samples {
            debug!(
                family,
                samples = reviews.len(),
                min = self.config.min_samples,
                "telemetry window below minimum"
            );
            return Ok(None);
        }

        let total = reviews.len() as f64;
        let sr = reviews
            .iter()
            .filter(|s| s.payload.metrics().and_then(|m| m.success) == Some(true))
            .count() as f64
            / total;
        let cr = reviews
            .iter()
            .filter(|s| {
                s.payload
                    .metrics()
                    .and_then(|m| m.confidence)
                    .is_some_and(|c| c > self.config.confirmation_confidence)
            })
            .count() as f64
            / total;
        let xr = reviews.iter().filter(|s| self.is_contradiction(s)).count() as f64 / total;

        // Rarity is measured against the family's appearances outside
        // this review set.
        let occurrences = self
            .strands
            .count_family_occurrences(family, window_start, None)
            .await?
            .saturating_sub(reviews.len() as u64);
        let surprise = surprise_from_occurrences(occurrences);

        Ok(Some(MotifTelemetry {
            sr,
            cr,
            xr,
            surprise,
            sample_count: reviews.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surprise_steps() {
        assert!((surprise_from_occurrences(0) - 1.0).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(1) - 0.8).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(4) - 0.8).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(5) - 0.6).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(9) - 0.6).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(10) - 0.4).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(19) - 0.4).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(20) - 0.2).abs() < f64::EPSILON);
        assert!((surprise_from_occurrences(500) - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_surprise_monotone_decreasing() {
        let mut last = f64::INFINITY;
        for n in 0..30 {
            let s = surprise_from_occurrences(n);
            assert!(s <= last);
            assert!((0.2..=1.0).contains(&s));
            last = s;
        }
    }
}
