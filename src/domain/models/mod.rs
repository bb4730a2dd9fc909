//! Domain models for the weaver braiding pipeline.

pub mod cluster;
pub mod config;
pub mod motif;
pub mod prediction;
pub mod strand;

pub use cluster::{ClusterAssignment, ClusterDimension};
pub use config::{
    BraidingConfig, Config, DatabaseConfig, HeuristicsConfig, LoggingConfig, PriceFeedConfig,
    ResonanceConfig, TrackerConfig,
};
pub use motif::{MotifState, MotifTelemetry, ResonanceCoefficients, PHI_MAX, PHI_MIN};
pub use prediction::{
    PredictionOutcome, PredictionRecord, PredictionStatus, MAX_DRAWDOWN_LIMIT,
};
pub use strand::{OutcomeMetrics, PatternDescriptor, Strand, StrandKind, StrandPayload};
