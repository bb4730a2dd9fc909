//! Service layer: the braiding pipeline, resonance feedback loop, and
//! prediction lifecycle, all expressed against the domain ports.

pub mod braid_level_manager;
pub mod braid_promoter;
pub mod cluster_grouper;
pub mod context_field;
pub mod experiment_queue;
pub mod prediction_tracker;
pub mod resonance_daemon;
pub mod resonance_updater;
pub mod telemetry_updater;

pub use braid_level_manager::{BraidLevelManager, BraidReport};
pub use braid_promoter::BraidPromoter;
pub use context_field::ContextField;
pub use experiment_queue::{
    order_candidates, ExperimentCandidate, ExperimentQueue, RankedCandidate,
};
pub use prediction_tracker::{PredictionTracker, TrackReport};
pub use resonance_daemon::{
    ResonanceDaemon, ResonanceDaemonConfig, ResonanceDaemonEvent, ResonanceDaemonHandle,
    ResonanceDaemonStatus, StopReason,
};
pub use resonance_updater::ResonanceUpdater;
pub use telemetry_updater::TelemetryUpdater;
