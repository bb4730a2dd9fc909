//! Property tests: resonance state stays inside its guardrails for any
//! telemetry sequence, and queue ordering never exceeds the family cap.

use proptest::prelude::*;

use weaver::domain::models::{
    MotifState, MotifTelemetry, ResonanceCoefficients, PHI_MAX, PHI_MIN,
};
use weaver::services::{order_candidates, ExperimentCandidate};

fn telemetry_strategy() -> impl Strategy<Value = MotifTelemetry> {
    (0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64, 1usize..100).prop_map(
        |(sr, cr, xr, surprise, sample_count)| MotifTelemetry {
            sr,
            cr,
            xr,
            surprise,
            sample_count,
        },
    )
}

proptest! {
    #[test]
    fn phi_and_rho_stay_bounded(updates in prop::collection::vec(telemetry_strategy(), 1..200)) {
        let coeffs = ResonanceCoefficients::default();
        let mut state = MotifState::new("family");

        for telemetry in updates {
            state.apply_telemetry(telemetry, &coeffs);
            prop_assert!((PHI_MIN..=PHI_MAX).contains(&state.phi));
            prop_assert!((coeffs.rho_min..=coeffs.rho_max).contains(&state.rho));
            prop_assert!(state.phi.is_finite());
            prop_assert!(state.rho.is_finite());
        }
    }

    #[test]
    fn version_strictly_increases(updates in prop::collection::vec(telemetry_strategy(), 1..50)) {
        let coeffs = ResonanceCoefficients::default();
        let mut state = MotifState::new("family");
        let mut last_version = state.version;

        for telemetry in updates {
            state.apply_telemetry(telemetry, &coeffs);
            prop_assert!(state.version > last_version);
            last_version = state.version;
        }
    }

    #[test]
    fn family_cap_always_respected(
        phis in prop::collection::vec((0usize..5, 0.0..=2.0f64), 0..40),
        cap in 1usize..5,
    ) {
        let candidates: Vec<ExperimentCandidate> = phis
            .into_iter()
            .map(|(family, phi)| {
                let mut c = ExperimentCandidate::new(format!("f{family}"), "probe");
                c.phi = phi;
                c.rho = 1.0;
                c.surprise = 1.0;
                c
            })
            .collect();

        let ranked = order_candidates(candidates, cap);

        // Never more than `cap` per family, always sorted descending.
        let mut counts = std::collections::HashMap::new();
        for item in &ranked {
            *counts.entry(item.candidate.motif_family.clone()).or_insert(0usize) += 1;
        }
        for count in counts.values() {
            prop_assert!(*count <= cap);
        }
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}
