//! Braid level manager: drives promotion repeatedly across levels until
//! no cluster at any level qualifies.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::WeaverResult;
use crate::domain::models::Strand;
use crate::domain::ports::{StrandFilters, StrandRepository};
use crate::services::braid_promoter::BraidPromoter;
use crate::services::cluster_grouper;

/// Outcome of one full braiding pass. Callers get the newly created
/// braids and an error count; no partially-consumed cluster is ever left
/// behind (promotion is unit-atomic per cluster).
#[derive(Debug, Default)]
pub struct BraidReport {
    pub new_braids: Vec<Strand>,
    pub errors: usize,
}

impl BraidReport {
    pub fn created(&self) -> usize {
        self.new_braids.len()
    }
}

/// Repeatedly applies group + promote over every stored level until a
/// full ladder sweep creates zero new braids.
///
/// Re-entrant and safe to run concurrently with level-1 ingestion: new
/// arrivals simply enter the next pass. Termination is bounded because
/// each promotion consumes at least `min_strands` strands from a finite
/// per-dimension pool.
pub struct BraidLevelManager {
    strands: Arc<dyn StrandRepository>,
    promoter: BraidPromoter,
}

impl BraidLevelManager {
    pub fn new(strands: Arc<dyn StrandRepository>, promoter: BraidPromoter) -> Self {
        Self { strands, promoter }
    }

    /// Run one sweep at a single level. Returns braids created there, or
    /// `None` when the level holds no braidable strands, which marks the
    /// top of the ladder (sources are append-only, so a populated level
    /// always has a populated level below it).
    async fn run_level(&self, level: u32, report: &mut BraidReport) -> WeaverResult<Option<usize>> {
        let batch: Vec<Strand> = self
            .strands
            .query(StrandFilters::default().braid_level(level))
            .await?
            .into_iter()
            .filter(|s| s.kind().is_braidable())
            .collect();

        if batch.is_empty() {
            return Ok(None);
        }
        if batch.len() < self.promoter.min_strands() {
            return Ok(Some(0));
        }

        let mut created_here = 0;
        for ((dimension, key), cluster) in cluster_grouper::group(&batch) {
            match self
                .promoter
                .promote_cluster(dimension, &key, level, &cluster)
                .await
            {
                Ok(Some(braid)) => {
                    report.new_braids.push(braid);
                    created_here += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    // Deferred, not fatal: sources stay unconsumed and the
                    // cluster is re-evaluated next pass.
                    warn!(%dimension, cluster_key = %key, error = %e, "cluster promotion failed");
                    report.errors += 1;
                }
            }
        }
        Ok(Some(created_here))
    }

    /// Run ladder sweeps to fixpoint. Each sweep visits every level that
    /// holds strands, so a cluster deferred at a higher level (lesson
    /// failure, under threshold) is re-evaluated even when the levels
    /// below it are already at steady state. The pass ends when a full
    /// sweep creates zero new braids.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> WeaverResult<BraidReport> {
        let mut report = BraidReport::default();
        let mut top_level = 1;

        loop {
            let mut created_this_sweep = 0;
            let mut level = 1;
            while let Some(created) = self.run_level(level, &mut report).await? {
                created_this_sweep += created;
                level += 1;
            }
            top_level = top_level.max(level);
            if created_this_sweep == 0 {
                break;
            }
        }

        if report.created() > 0 || report.errors > 0 {
            info!(
                braids = report.created(),
                errors = report.errors,
                top_level,
                "braiding pass finished"
            );
        }
        Ok(report)
    }
}
