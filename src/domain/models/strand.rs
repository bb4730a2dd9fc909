//! Strand domain model.
//!
//! Strands are the unit of storage and exchange: small, append-only
//! analytical records emitted by pattern-detection agents. Braids are
//! strands too, distinguished only by `braid_level > 1` and a list of
//! source strand ids (weak back-references, not ownership).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::cluster::ClusterAssignment;

/// Kind tag for a strand record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrandKind {
    /// Raw pattern detection emitted by an agent.
    Signal,
    /// A live forecast tracked by the prediction lifecycle.
    Prediction,
    /// Finalized outcome of a prediction; the braiding pipeline's input.
    PredictionReview,
    /// Compressed summary of a qualifying cluster.
    Braid,
    /// Pattern-family record carrying resonance state.
    Motif,
    /// Cross-agent coordination signal.
    MetaSignal,
}

impl StrandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Prediction => "prediction",
            Self::PredictionReview => "prediction_review",
            Self::Braid => "braid",
            Self::Motif => "motif",
            Self::MetaSignal => "meta_signal",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "signal" => Some(Self::Signal),
            "prediction" => Some(Self::Prediction),
            "prediction_review" => Some(Self::PredictionReview),
            "braid" => Some(Self::Braid),
            "motif" => Some(Self::Motif),
            "meta_signal" => Some(Self::MetaSignal),
            _ => None,
        }
    }

    /// Whether strands of this kind participate in cluster-and-promote.
    /// Level-1 input is prediction reviews; braids re-enter at their level.
    pub fn is_braidable(&self) -> bool {
        matches!(self, Self::PredictionReview | Self::Braid)
    }
}

/// Pattern identity shared by most payload kinds. Every field is optional:
/// a strand missing a field is simply absent from the cluster dimensions
/// that key on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDescriptor {
    pub asset: Option<String>,
    pub timeframe: Option<String>,
    pub pattern_type: Option<String>,
    pub pattern_shape: Option<String>,
    pub detection_method: Option<String>,
    pub group_type: Option<String>,
    pub motif_family: Option<String>,
}

/// Numeric outcome fields carried by reviews and braids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    pub success: Option<bool>,
    pub confidence: Option<f64>,
    pub return_pct: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub persistence_score: Option<f64>,
    pub novelty_score: Option<f64>,
    pub surprise_rating: Option<f64>,
}

/// Typed payload per strand kind. Each variant carries an `extra` map so
/// the document shape can evolve additively without schema changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrandPayload {
    Signal {
        pattern: PatternDescriptor,
        confidence: f64,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        extra: HashMap<String, Value>,
    },
    Prediction {
        pattern: PatternDescriptor,
        /// Link to the PredictionRecord being tracked.
        prediction_id: Uuid,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        extra: HashMap<String, Value>,
    },
    PredictionReview {
        pattern: PatternDescriptor,
        metrics: OutcomeMetrics,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prediction_id: Option<Uuid>,
        /// Agent that originated the underlying prediction; feeds the
        /// majority vote for `braid_type`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        extra: HashMap<String, Value>,
    },
    Braid {
        braid_type: String,
        pattern: PatternDescriptor,
        metrics: OutcomeMetrics,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        extra: HashMap<String, Value>,
    },
    Motif {
        family: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<Uuid>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        extra: HashMap<String, Value>,
    },
    MetaSignal {
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        extra: HashMap<String, Value>,
    },
}

impl StrandPayload {
    /// Kind tag implied by this payload.
    pub fn kind(&self) -> StrandKind {
        match self {
            Self::Signal { .. } => StrandKind::Signal,
            Self::Prediction { .. } => StrandKind::Prediction,
            Self::PredictionReview { .. } => StrandKind::PredictionReview,
            Self::Braid { .. } => StrandKind::Braid,
            Self::Motif { .. } => StrandKind::Motif,
            Self::MetaSignal { .. } => StrandKind::MetaSignal,
        }
    }

    /// Pattern descriptor, for kinds that carry one.
    pub fn pattern(&self) -> Option<&PatternDescriptor> {
        match self {
            Self::Signal { pattern, .. }
            | Self::Prediction { pattern, .. }
            | Self::PredictionReview { pattern, .. }
            | Self::Braid { pattern, .. } => Some(pattern),
            Self::Motif { .. } | Self::MetaSignal { .. } => None,
        }
    }

    /// Outcome metrics, for kinds that carry them.
    pub fn metrics(&self) -> Option<&OutcomeMetrics> {
        match self {
            Self::PredictionReview { metrics, .. } | Self::Braid { metrics, .. } => Some(metrics),
            _ => None,
        }
    }

    /// Originating agent, used by the braid-type majority vote.
    pub fn agent(&self) -> Option<&str> {
        match self {
            Self::PredictionReview { agent, .. } => agent.as_deref(),
            _ => None,
        }
    }
}

/// An immutable-once-created analytical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strand {
    /// Unique identifier
    pub id: Uuid,
    /// Compression level. 1 for raw strands, bumped on each promotion.
    pub braid_level: u32,
    /// When created
    pub created_at: DateTime<Utc>,
    /// Typed content, tagged by kind.
    pub payload: StrandPayload,
    /// One membership tag per applicable cluster dimension.
    pub cluster_assignments: Vec<ClusterAssignment>,
    /// Human-readable lesson text; set only on braids.
    pub lesson: Option<String>,
    /// Ids of the strands this braid compressed. Weak references: sources
    /// stay independently queryable.
    pub source_strand_ids: Vec<Uuid>,
}

impl Strand {
    /// Create a level-1 strand from a payload.
    pub fn new(payload: StrandPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            braid_level: 1,
            created_at: Utc::now(),
            payload,
            cluster_assignments: Vec::new(),
            lesson: None,
            source_strand_ids: Vec::new(),
        }
    }

    /// Create a braid strand one level above its sources.
    pub fn braid(
        id: Uuid,
        source_level: u32,
        braid_type: impl Into<String>,
        pattern: PatternDescriptor,
        metrics: OutcomeMetrics,
        lesson: impl Into<String>,
        source_strand_ids: Vec<Uuid>,
    ) -> Self {
        Self {
            id,
            braid_level: source_level + 1,
            created_at: Utc::now(),
            payload: StrandPayload::Braid {
                braid_type: braid_type.into(),
                pattern,
                metrics,
                extra: HashMap::new(),
            },
            cluster_assignments: Vec::new(),
            lesson: Some(lesson.into()),
            source_strand_ids,
        }
    }

    /// Set an explicit id (deterministic ids for braids).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Attach cluster assignments.
    pub fn with_assignments(mut self, assignments: Vec<ClusterAssignment>) -> Self {
        self.cluster_assignments = assignments;
        self
    }

    pub fn kind(&self) -> StrandKind {
        self.payload.kind()
    }

    /// Find the assignment for a dimension at this strand's level.
    pub fn assignment(
        &self,
        dimension: super::cluster::ClusterDimension,
    ) -> Option<&ClusterAssignment> {
        self.cluster_assignments
            .iter()
            .find(|a| a.dimension == dimension && a.braid_level == self.braid_level)
    }

    /// Whether this strand is still eligible for promotion in a dimension.
    pub fn is_unconsumed(&self, dimension: super::cluster::ClusterDimension) -> bool {
        self.assignment(dimension).is_some_and(|a| !a.consumed)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.braid_level == 0 {
            return Err("braid_level must be >= 1".to_string());
        }
        if self.braid_level > 1 && self.source_strand_ids.is_empty() {
            return Err("a braid must reference its source strands".to_string());
        }
        if self.lesson.is_some() && self.kind() != StrandKind::Braid {
            return Err("lesson is only set on braids".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_payload() -> StrandPayload {
        StrandPayload::PredictionReview {
            pattern: PatternDescriptor {
                asset: Some("BTC".to_string()),
                timeframe: Some("1h".to_string()),
                pattern_type: Some("volume_spike".to_string()),
                ..Default::default()
            },
            metrics: OutcomeMetrics {
                success: Some(true),
                confidence: Some(0.8),
                ..Default::default()
            },
            prediction_id: None,
            agent: Some("raw_data_intelligence".to_string()),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            StrandKind::Signal,
            StrandKind::Prediction,
            StrandKind::PredictionReview,
            StrandKind::Braid,
            StrandKind::Motif,
            StrandKind::MetaSignal,
        ] {
            assert_eq!(StrandKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(StrandKind::from_str("bogus"), None);
    }

    #[test]
    fn test_new_strand_starts_at_level_one() {
        let strand = Strand::new(review_payload());
        assert_eq!(strand.braid_level, 1);
        assert_eq!(strand.kind(), StrandKind::PredictionReview);
        assert!(strand.lesson.is_none());
        assert!(strand.validate().is_ok());
    }

    #[test]
    fn test_braid_level_bump() {
        let sources = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let braid = Strand::braid(
            Uuid::new_v4(),
            1,
            "volume_braid",
            PatternDescriptor::default(),
            OutcomeMetrics::default(),
            "lesson text",
            sources.clone(),
        );
        assert_eq!(braid.braid_level, 2);
        assert_eq!(braid.kind(), StrandKind::Braid);
        assert_eq!(braid.source_strand_ids, sources);
        assert!(braid.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_braid_without_sources() {
        let mut braid = Strand::braid(
            Uuid::new_v4(),
            1,
            "b",
            PatternDescriptor::default(),
            OutcomeMetrics::default(),
            "l",
            vec![Uuid::new_v4()],
        );
        braid.source_strand_ids.clear();
        assert!(braid.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_lesson_on_non_braid() {
        let mut strand = Strand::new(review_payload());
        strand.lesson = Some("should not be here".to_string());
        assert!(strand.validate().is_err());
    }

    #[test]
    fn test_payload_json_is_kind_tagged() {
        let json = serde_json::to_value(review_payload()).unwrap();
        assert_eq!(json["type"], "prediction_review");
        let back: StrandPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), StrandKind::PredictionReview);
    }
}
