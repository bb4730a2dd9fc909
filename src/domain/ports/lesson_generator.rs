//! Lesson generator port.

use async_trait::async_trait;

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::Strand;

/// Turns a cluster of strands into human-readable lesson text embedded in
/// the braid. External collaborator (typically an LLM service); failure or
/// an empty lesson means "do not promote this cluster this pass".
#[async_trait]
pub trait LessonGenerator: Send + Sync {
    async fn generate(&self, strands: &[Strand], braid_type: &str) -> WeaverResult<String>;
}

/// Template-based generator used when no LLM backend is wired. Produces a
/// deterministic one-line summary so the pipeline stays runnable.
#[derive(Debug, Clone, Default)]
pub struct StaticLessonGenerator;

#[async_trait]
impl LessonGenerator for StaticLessonGenerator {
    async fn generate(&self, strands: &[Strand], braid_type: &str) -> WeaverResult<String> {
        if strands.is_empty() {
            return Err(WeaverError::LessonFailed("no strands in cluster".to_string()));
        }
        let successes = strands
            .iter()
            .filter(|s| {
                s.payload
                    .metrics()
                    .and_then(|m| m.success)
                    .unwrap_or(false)
            })
            .count();
        Ok(format!(
            "{} compressed from {} strands ({} successful) at level {}",
            braid_type,
            strands.len(),
            successes,
            strands[0].braid_level,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{OutcomeMetrics, PatternDescriptor, Strand, StrandPayload};
    use std::collections::HashMap;

    fn review(success: bool) -> Strand {
        Strand::new(StrandPayload::PredictionReview {
            pattern: PatternDescriptor::default(),
            metrics: OutcomeMetrics { success: Some(success), ..Default::default() },
            prediction_id: None,
            agent: None,
            extra: HashMap::new(),
        })
    }

    #[tokio::test]
    async fn test_static_generator_summarizes() {
        let strands = vec![review(true), review(true), review(false)];
        let lesson = StaticLessonGenerator
            .generate(&strands, "volume_braid")
            .await
            .unwrap();
        assert!(lesson.contains("volume_braid"));
        assert!(lesson.contains("3 strands"));
        assert!(lesson.contains("2 successful"));
    }

    #[tokio::test]
    async fn test_static_generator_rejects_empty_cluster() {
        assert!(StaticLessonGenerator.generate(&[], "x").await.is_err());
    }
}
