//! Cluster dimensions and per-dimension membership tags.

use serde::{Deserialize, Serialize};

/// The fixed set of independent dimensions strands are grouped along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterDimension {
    Asset,
    Timeframe,
    PatternTimeframe,
    Outcome,
    DetectionMethod,
    PatternShape,
    GroupType,
}

impl ClusterDimension {
    /// All dimensions, in evaluation order.
    pub const ALL: [Self; 7] = [
        Self::Asset,
        Self::Timeframe,
        Self::PatternTimeframe,
        Self::Outcome,
        Self::DetectionMethod,
        Self::PatternShape,
        Self::GroupType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Timeframe => "timeframe",
            Self::PatternTimeframe => "pattern_timeframe",
            Self::Outcome => "outcome",
            Self::DetectionMethod => "detection_method",
            Self::PatternShape => "pattern_shape",
            Self::GroupType => "group_type",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asset" => Some(Self::Asset),
            "timeframe" => Some(Self::Timeframe),
            "pattern_timeframe" => Some(Self::PatternTimeframe),
            "outcome" => Some(Self::Outcome),
            "detection_method" => Some(Self::DetectionMethod),
            "pattern_shape" => Some(Self::PatternShape),
            "group_type" => Some(Self::GroupType),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClusterDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A strand's membership tag in one cluster dimension.
///
/// `consumed` is scoped to `(dimension, braid_level)`, never global. This
/// is the invariant that lets a strand be promoted in one dimension while
/// remaining eligible in every other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub dimension: ClusterDimension,
    pub cluster_key: String,
    pub braid_level: u32,
    pub consumed: bool,
}

impl ClusterAssignment {
    pub fn new(dimension: ClusterDimension, cluster_key: impl Into<String>, braid_level: u32) -> Self {
        Self {
            dimension,
            cluster_key: cluster_key.into(),
            braid_level,
            consumed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_roundtrip() {
        for dim in ClusterDimension::ALL {
            assert_eq!(ClusterDimension::from_str(dim.as_str()), Some(dim));
        }
        assert_eq!(ClusterDimension::from_str("nope"), None);
    }

    #[test]
    fn test_assignment_starts_unconsumed() {
        let a = ClusterAssignment::new(ClusterDimension::Asset, "BTC", 1);
        assert!(!a.consumed);
        assert_eq!(a.braid_level, 1);
    }
}
