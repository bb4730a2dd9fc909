//! Experiment queue: turns recent signal strands into candidates, scores
//! them against their family's resonance state, and ranks them with a
//! per-family cap.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::WeaverResult;
use crate::domain::models::{MotifState, ResonanceConfig, StrandKind};
use crate::domain::ports::{MotifRepository, StrandFilters, StrandRepository};

/// Upper bound on signal strands scanned per queue build.
const SIGNAL_SCAN_LIMIT: i64 = 500;

/// A proposed experiment tagged with its pattern family and the resonance
/// snapshot it was scored against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentCandidate {
    pub id: Uuid,
    pub motif_family: String,
    pub description: String,
    pub phi: f64,
    pub rho: f64,
    pub surprise: f64,
}

impl ExperimentCandidate {
    pub fn new(motif_family: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            motif_family: motif_family.into(),
            description: description.into(),
            phi: 0.0,
            rho: 1.0,
            surprise: 0.0,
        }
    }

    /// Set an explicit id (candidates built from strands reuse the strand
    /// id so reruns rank deterministically).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Tag a candidate with the current resonance state of its family.
    pub fn with_state(mut self, state: &MotifState) -> Self {
        self.phi = state.phi;
        self.rho = state.rho;
        self.surprise = state.telemetry.surprise;
        self
    }

    pub fn score(&self) -> f64 {
        self.phi * self.rho * self.surprise
    }
}

/// A candidate that survived ordering, with the score that ranked it.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub candidate: ExperimentCandidate,
    pub score: f64,
}

/// Builds the ranked experiment queue from stored strands and motif state.
pub struct ExperimentQueue {
    strands: Arc<dyn StrandRepository>,
    motifs: Arc<dyn MotifRepository>,
    config: ResonanceConfig,
}

impl ExperimentQueue {
    pub fn new(
        strands: Arc<dyn StrandRepository>,
        motifs: Arc<dyn MotifRepository>,
        config: ResonanceConfig,
    ) -> Self {
        Self {
            strands,
            motifs,
            config,
        }
    }

    /// Build the queue over the telemetry window: one candidate per signal
    /// strand, scored against its family's resonance state and ranked
    /// under the configured `family_cap`. Signals without a family are
    /// skipped; families with no motif state yet score zero.
    pub async fn build(&self) -> WeaverResult<Vec<RankedCandidate>> {
        let window_start = Utc::now() - Duration::hours(self.config.window_hours);
        let signals = self
            .strands
            .query(
                StrandFilters::default()
                    .kind(StrandKind::Signal)
                    .created_after(window_start)
                    .limit(SIGNAL_SCAN_LIMIT),
            )
            .await?;

        let mut states: HashMap<String, Option<MotifState>> = HashMap::new();
        let mut candidates = Vec::with_capacity(signals.len());
        for signal in signals {
            let Some(pattern) = signal.payload.pattern() else {
                continue;
            };
            let Some(family) = pattern
                .motif_family
                .clone()
                .or_else(|| pattern.pattern_type.clone())
            else {
                continue;
            };
            let description = pattern
                .pattern_type
                .clone()
                .unwrap_or_else(|| family.clone());

            if !states.contains_key(&family) {
                let state = self.motifs.get_by_family(&family).await?;
                states.insert(family.clone(), state);
            }

            let mut candidate =
                ExperimentCandidate::new(&family, description).with_id(signal.id);
            if let Some(state) = states.get(&family).and_then(|s| s.as_ref()) {
                candidate = candidate.with_state(state);
            }
            candidates.push(candidate);
        }

        Ok(order_candidates(candidates, self.config.family_cap))
    }
}

/// Order candidates by `phi * rho * surprise` descending and apply the
/// family cap: once a family has `family_cap` kept candidates, its
/// lower-ranked members are dropped outright, not deprioritized, so one
/// dominant family cannot starve the queue. Ties break by id for
/// determinism.
pub fn order_candidates(
    candidates: Vec<ExperimentCandidate>,
    family_cap: usize,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let score = candidate.score();
            RankedCandidate { candidate, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });

    let mut kept: Vec<RankedCandidate> = Vec::with_capacity(ranked.len());
    let mut per_family: HashMap<String, usize> = HashMap::new();
    for item in ranked {
        let count = per_family
            .entry(item.candidate.motif_family.clone())
            .or_insert(0);
        if *count >= family_cap {
            continue;
        }
        *count += 1;
        kept.push(item);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(family: &str, score: f64) -> ExperimentCandidate {
        let mut c = ExperimentCandidate::new(family, format!("{family} experiment"));
        // Encode the desired score through phi with rho and surprise at 1.
        c.phi = score;
        c.rho = 1.0;
        c.surprise = 1.0;
        c
    }

    #[test]
    fn test_descending_order() {
        let ranked = order_candidates(
            vec![candidate("a", 0.3), candidate("b", 0.9), candidate("c", 0.6)],
            3,
        );
        let families: Vec<&str> = ranked
            .iter()
            .map(|r| r.candidate.motif_family.as_str())
            .collect();
        assert_eq!(families, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_family_cap_drops_overflow() {
        // Four family-A candidates (0.9, 0.8, 0.7, 0.6) and one B (0.5)
        // with cap 3: the 0.6 A is dropped, not deprioritized.
        let ranked = order_candidates(
            vec![
                candidate("A", 0.9),
                candidate("A", 0.8),
                candidate("A", 0.7),
                candidate("A", 0.6),
                candidate("B", 0.5),
            ],
            3,
        );

        assert_eq!(ranked.len(), 4);
        let a_kept: Vec<f64> = ranked
            .iter()
            .filter(|r| r.candidate.motif_family == "A")
            .map(|r| r.score)
            .collect();
        assert_eq!(a_kept.len(), 3);
        assert!(!a_kept.iter().any(|s| (s - 0.6).abs() < 1e-9));

        let b_kept = ranked
            .iter()
            .filter(|r| r.candidate.motif_family == "B")
            .count();
        assert_eq!(b_kept, 1);

        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_with_state_snapshot() {
        let mut state = MotifState::new("volume_spike");
        state.phi = 1.2;
        state.rho = 1.5;
        state.telemetry.surprise = 0.5;

        let c = ExperimentCandidate::new("volume_spike", "volume spike retest").with_state(&state);
        assert!((c.score() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_untagged_candidate_scores_zero() {
        let c = ExperimentCandidate::new("ghost", "no state yet");
        assert_eq!(c.score(), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(order_candidates(vec![], 3).is_empty());
    }
}
