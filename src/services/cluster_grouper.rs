//! Cluster grouping: partition a batch of strands into named cluster
//! dimensions and keys.
//!
//! Every key is a deterministic pure function of the strand payload.
//! Strands missing the required field for a dimension are simply absent
//! from that dimension's groups; that is not an error. This stage is
//! read-only.

use std::collections::HashMap;

use crate::domain::models::{ClusterAssignment, ClusterDimension, Strand, StrandPayload};

/// Key under which a group of strands is clustered.
pub type ClusterKey = (ClusterDimension, String);

/// Extract the cluster key for one dimension from a payload.
pub fn cluster_key(dimension: ClusterDimension, payload: &StrandPayload) -> Option<String> {
    let pattern = payload.pattern();
    match dimension {
        ClusterDimension::Asset => pattern.and_then(|p| p.asset.clone()),
        ClusterDimension::Timeframe => pattern.and_then(|p| p.timeframe.clone()),
        ClusterDimension::PatternTimeframe => pattern.and_then(|p| {
            let pattern_type = p.pattern_type.as_deref()?;
            let timeframe = p.timeframe.as_deref()?;
            Some(format!("{pattern_type}_{timeframe}"))
        }),
        ClusterDimension::Outcome => payload.metrics().and_then(|m| {
            m.success
                .map(|s| if s { "success" } else { "failure" }.to_string())
        }),
        ClusterDimension::DetectionMethod => pattern.and_then(|p| p.detection_method.clone()),
        ClusterDimension::PatternShape => pattern.and_then(|p| p.pattern_shape.clone()),
        ClusterDimension::GroupType => pattern.and_then(|p| p.group_type.clone()),
    }
}

/// Compute the full assignment list for a strand at its braid level.
pub fn assign_clusters(strand: &Strand) -> Vec<ClusterAssignment> {
    ClusterDimension::ALL
        .iter()
        .filter_map(|&dimension| {
            cluster_key(dimension, &strand.payload)
                .map(|key| ClusterAssignment::new(dimension, key, strand.braid_level))
        })
        .collect()
}

/// Partition a batch of strands into groups per (dimension, key).
///
/// The batch is expected to be homogeneous in kind and braid level; the
/// grouper does not enforce that, the level manager's queries do.
pub fn group(strands: &[Strand]) -> HashMap<ClusterKey, Vec<Strand>> {
    let mut groups: HashMap<ClusterKey, Vec<Strand>> = HashMap::new();
    for strand in strands {
        for dimension in ClusterDimension::ALL {
            if let Some(key) = cluster_key(dimension, &strand.payload) {
                groups
                    .entry((dimension, key))
                    .or_default()
                    .push(strand.clone());
            }
        }
    }
    groups
}
