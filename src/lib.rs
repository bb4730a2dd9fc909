//! Weaver - strand braiding and resonance pipeline
//!
//! Weaver clusters analytical records (strands) along independent
//! dimensions, compresses qualifying clusters into higher-level braids,
//! tracks trading predictions to finalized outcomes, and feeds those
//! outcomes back into per-family resonance state.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business logic and domain models
//! - **Service Layer** (`services`): The braiding, resonance, and tracking engines
//! - **Application Layer** (`application`): Orchestration of the background workers
//! - **Adapters** (`adapters`): SQLite repositories and the HTTP price feed
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging, retries
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use weaver::application::WeaverOrchestrator;
//! use weaver::infrastructure::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let mut orchestrator = WeaverOrchestrator::connect(config).await?;
//!     orchestrator.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{OrchestratorStats, WeaverOrchestrator};
pub use domain::errors::{WeaverError, WeaverResult};
pub use domain::models::{
    ClusterAssignment, ClusterDimension, Config, MotifState, MotifTelemetry, OutcomeMetrics,
    PatternDescriptor, PredictionOutcome, PredictionRecord, PredictionStatus, Strand, StrandKind,
    StrandPayload,
};
pub use domain::ports::{
    LessonGenerator, MotifRepository, PredictionRepository, PriceFeed, StrandFilters,
    StrandRepository,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BraidLevelManager, BraidPromoter, PredictionTracker, ResonanceDaemon};
