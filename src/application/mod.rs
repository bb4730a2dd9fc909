pub mod orchestrator;

pub use orchestrator::{OrchestratorStats, WeaverOrchestrator};
