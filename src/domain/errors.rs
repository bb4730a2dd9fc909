//! Domain errors for the weaver system.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors.
#[derive(Debug, Error)]
pub enum WeaverError {
    #[error("Strand not found: {0}")]
    StrandNotFound(Uuid),

    #[error("Motif state not found: {0}")]
    MotifNotFound(String),

    #[error("Prediction not found: {0}")]
    PredictionNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    /// The store could not atomically check-then-insert a braid. This
    /// risks double-counting a cluster into two braids, so it always
    /// surfaces loudly instead of being retried.
    #[error("Duplicate braid detected for cluster {cluster_key}: {braid_id}")]
    DuplicateBraid { braid_id: Uuid, cluster_key: String },

    #[error("Lesson generation failed: {0}")]
    LessonFailed(String),

    #[error("Price feed error: {0}")]
    PriceFeed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type WeaverResult<T> = Result<T, WeaverError>;

impl WeaverError {
    /// Transient errors are retried with backoff and never treated as a
    /// semantic failure. Everything else is permanent for this pass.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::PriceFeed(_) | Self::ConcurrencyConflict { .. }
        )
    }
}

impl From<sqlx::Error> for WeaverError {
    fn from(err: sqlx::Error) -> Self {
        WeaverError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for WeaverError {
    fn from(err: serde_json::Error) -> Self {
        WeaverError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(WeaverError::Database("locked".into()).is_transient());
        assert!(WeaverError::PriceFeed("timeout".into()).is_transient());
        assert!(WeaverError::ConcurrencyConflict {
            entity: "motif".into(),
            id: "x".into()
        }
        .is_transient());

        assert!(!WeaverError::LessonFailed("empty".into()).is_transient());
        assert!(!WeaverError::DuplicateBraid {
            braid_id: Uuid::new_v4(),
            cluster_key: "asset:BTC".into()
        }
        .is_transient());
    }
}
