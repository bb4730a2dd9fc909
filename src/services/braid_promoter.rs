//! Braid promotion engine.
//!
//! Per cluster, decides whether to compress strands into a braid, marks
//! sources consumed for that dimension only, and produces the new braid
//! strand. Promotion is all-or-nothing per cluster: if the lesson
//! generator fails, nothing is consumed and the cluster is retried on the
//! next pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::{
    BraidingConfig, ClusterDimension, OutcomeMetrics, PatternDescriptor, Strand, StrandKind,
    StrandPayload,
};
use crate::domain::ports::{LessonGenerator, StrandRepository};
use crate::services::cluster_grouper::assign_clusters;

/// Namespace for deterministic braid ids. Fixed so a re-run after a crash
/// derives the same id for the same cluster and source set.
const BRAID_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b72_61f3_9d41_4c2a_8f05_3e77_a1b2_c9d4);

/// Derive the deterministic id for a braid compressing `source_ids` under
/// one cluster.
pub fn deterministic_braid_id(
    dimension: ClusterDimension,
    cluster_key: &str,
    source_level: u32,
    source_ids: &[Uuid],
) -> Uuid {
    let mut sorted: Vec<Uuid> = source_ids.to_vec();
    sorted.sort();
    let mut name = format!("{dimension}:{cluster_key}:{source_level}");
    for id in sorted {
        name.push(':');
        name.push_str(&id.to_string());
    }
    Uuid::new_v5(&BRAID_ID_NAMESPACE, name.as_bytes())
}

/// Majority vote over originating agents/kinds, falling back to
/// `mixed_braid` when no strict majority exists.
pub fn braid_type_vote(cluster: &[Strand]) -> String {
    let mut tally: HashMap<String, usize> = HashMap::new();
    for strand in cluster {
        let vote = strand
            .payload
            .agent()
            .map(String::from)
            .or_else(|| match &strand.payload {
                StrandPayload::Braid { braid_type, .. } => Some(braid_type.clone()),
                _ => None,
            })
            .unwrap_or_else(|| strand.kind().as_str().to_string());
        *tally.entry(vote).or_insert(0) += 1;
    }

    let winner = tally
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)));

    match winner {
        Some((name, count)) if count * 2 > cluster.len() => {
            if name.ends_with("_braid") {
                name
            } else {
                format!("{name}_braid")
            }
        }
        _ => "mixed_braid".to_string(),
    }
}

fn mean_of(cluster: &[Strand], field: impl Fn(&OutcomeMetrics) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = cluster
        .iter()
        .filter_map(|s| s.payload.metrics().and_then(&field))
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Arithmetic means across sources, field by field.
fn aggregate_metrics(cluster: &[Strand]) -> OutcomeMetrics {
    let successes: Vec<bool> = cluster
        .iter()
        .filter_map(|s| s.payload.metrics().and_then(|m| m.success))
        .collect();
    let success = if successes.is_empty() {
        None
    } else {
        let rate = successes.iter().filter(|s| **s).count() as f64 / successes.len() as f64;
        Some(rate > 0.5)
    };

    OutcomeMetrics {
        success,
        confidence: mean_of(cluster, |m| m.confidence),
        return_pct: mean_of(cluster, |m| m.return_pct),
        max_drawdown: mean_of(cluster, |m| m.max_drawdown),
        persistence_score: mean_of(cluster, |m| m.persistence_score),
        novelty_score: mean_of(cluster, |m| m.novelty_score),
        surprise_rating: mean_of(cluster, |m| m.surprise_rating),
    }
}

/// Keep a descriptor field only when every source that has it agrees.
fn aggregate_pattern(cluster: &[Strand]) -> PatternDescriptor {
    fn common(
        cluster: &[Strand],
        field: impl Fn(&PatternDescriptor) -> Option<&String>,
    ) -> Option<String> {
        let mut values = cluster
            .iter()
            .filter_map(|s| s.payload.pattern().and_then(&field));
        let first = values.next()?;
        if values.all(|v| v == first) {
            Some(first.clone())
        } else {
            None
        }
    }

    PatternDescriptor {
        asset: common(cluster, |p| p.asset.as_ref()),
        timeframe: common(cluster, |p| p.timeframe.as_ref()),
        pattern_type: common(cluster, |p| p.pattern_type.as_ref()),
        pattern_shape: common(cluster, |p| p.pattern_shape.as_ref()),
        detection_method: common(cluster, |p| p.detection_method.as_ref()),
        group_type: common(cluster, |p| p.group_type.as_ref()),
        motif_family: common(cluster, |p| p.motif_family.as_ref()),
    }
}

/// Keep one representative per underlying source set. Braids promoted
/// along different dimensions compress the same sources; without this
/// filter those near-duplicates would requalify at every level and braid
/// growth would never terminate. Strands without sources always pass.
fn dedupe_by_sources(strands: Vec<Strand>) -> Vec<Strand> {
    let mut seen: HashSet<Vec<Uuid>> = HashSet::new();
    strands
        .into_iter()
        .filter(|s| {
            if s.source_strand_ids.is_empty() {
                return true;
            }
            let mut key = s.source_strand_ids.clone();
            key.sort();
            seen.insert(key)
        })
        .collect()
}

/// Braid promotion engine over one strand repository and lesson backend.
pub struct BraidPromoter {
    strands: Arc<dyn StrandRepository>,
    lessons: Arc<dyn LessonGenerator>,
    config: BraidingConfig,
}

impl BraidPromoter {
    pub fn new(
        strands: Arc<dyn StrandRepository>,
        lessons: Arc<dyn LessonGenerator>,
        config: BraidingConfig,
    ) -> Self {
        Self { strands, lessons, config }
    }

    /// Whether the quality gates pass for a cluster's unconsumed strands.
    fn gates_met(&self, cluster: &[Strand]) -> bool {
        let persistence = mean_of(cluster, |m| m.persistence_score);
        let novelty = mean_of(cluster, |m| m.novelty_score);
        let surprise = mean_of(cluster, |m| m.surprise_rating);

        persistence.is_some_and(|v| v >= self.config.min_persistence)
            && novelty.is_some_and(|v| v >= self.config.min_novelty)
            && surprise.is_some_and(|v| v >= self.config.min_surprise)
    }

    /// Evaluate one cluster at `source_level`; promote it if it qualifies.
    ///
    /// Returns the new braid if one was created this call. `Ok(None)`
    /// covers every deferral: undersized cluster, failed gates, or a braid
    /// already created by an earlier (possibly crashed) pass.
    #[instrument(skip(self, cluster), fields(dimension = %dimension, cluster_key = %cluster_key))]
    pub async fn promote_cluster(
        &self,
        dimension: ClusterDimension,
        cluster_key: &str,
        source_level: u32,
        cluster: &[Strand],
    ) -> WeaverResult<Option<Strand>> {
        let eligible: Vec<Strand> = dedupe_by_sources(
            cluster
                .iter()
                .filter(|s| s.braid_level == source_level && s.is_unconsumed(dimension))
                .cloned()
                .collect(),
        );

        if eligible.len() < self.config.min_strands {
            debug!(
                eligible = eligible.len(),
                min = self.config.min_strands,
                "cluster below promotion threshold"
            );
            return Ok(None);
        }

        if !self.gates_met(&eligible) {
            debug!("cluster failed quality gates");
            return Ok(None);
        }

        let source_ids: Vec<Uuid> = eligible.iter().map(|s| s.id).collect();
        let braid_id = deterministic_braid_id(dimension, cluster_key, source_level, &source_ids);
        let braid_type = braid_type_vote(&eligible);

        let lesson = self.lessons.generate(&eligible, &braid_type).await?;
        if lesson.trim().is_empty() {
            return Err(WeaverError::LessonFailed(format!(
                "empty lesson for cluster {dimension}:{cluster_key}"
            )));
        }

        let mut braid = Strand::braid(
            braid_id,
            source_level,
            braid_type,
            aggregate_pattern(&eligible),
            aggregate_metrics(&eligible),
            lesson,
            source_ids,
        );
        braid.cluster_assignments = assign_clusters(&braid);

        let created = self
            .strands
            .insert_braid_with_consumption(&braid, dimension, source_level)
            .await?;

        if created {
            info!(
                braid_id = %braid.id,
                sources = braid.source_strand_ids.len(),
                level = braid.braid_level,
                "promoted cluster into braid"
            );
            Ok(Some(braid))
        } else {
            debug!(braid_id = %braid.id, "braid already existed, consumption repaired");
            Ok(None)
        }
    }

    pub fn min_strands(&self) -> usize {
        self.config.min_strands
    }
}
