//! Prediction tracker: polls active predictions against the price feed,
//! drives their lifecycle transitions, and emits a review strand on every
//! terminal outcome.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::{
    OutcomeMetrics, PredictionOutcome, PredictionRecord, Strand, StrandPayload,
};
use crate::domain::ports::{PredictionRepository, PriceFeed, StrandRepository};
use crate::infrastructure::RetryPolicy;
use crate::services::cluster_grouper;

/// Counters from one polling sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackReport {
    pub polled: usize,
    pub finalized: usize,
    pub errors: usize,
}

pub struct PredictionTracker {
    predictions: Arc<dyn PredictionRepository>,
    strands: Arc<dyn StrandRepository>,
    feed: Arc<dyn PriceFeed>,
    retry: RetryPolicy,
}

impl PredictionTracker {
    pub fn new(
        predictions: Arc<dyn PredictionRepository>,
        strands: Arc<dyn StrandRepository>,
        feed: Arc<dyn PriceFeed>,
    ) -> Self {
        Self {
            predictions,
            strands,
            feed,
            // The terminal status is already committed by the time a review
            // is written, so a failed insert here would lose the review for
            // good. Keep the budget under one poll interval.
            retry: RetryPolicy::new(200, 2_000, 10_000),
        }
    }

    /// Register a new forecast and its companion prediction strand.
    pub async fn open(&self, record: &PredictionRecord) -> WeaverResult<()> {
        self.predictions.insert(record).await?;

        let strand = Strand::new(StrandPayload::Prediction {
            pattern: record.pattern.clone(),
            prediction_id: record.id,
            extra: HashMap::new(),
        });
        let assignments = cluster_grouper::assign_clusters(&strand);
        self.strands
            .insert(&strand.with_assignments(assignments))
            .await?;
        Ok(())
    }

    /// Poll every active prediction once.
    ///
    /// A prediction with no quote this tick is still checked for expiry;
    /// market silence never keeps a record alive past its time budget.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> WeaverResult<TrackReport> {
        let active = self.predictions.list_active().await?;
        let mut report = TrackReport {
            polled: active.len(),
            ..TrackReport::default()
        };

        for mut record in active {
            let expected_version = record.version;
            let now = Utc::now();

            let outcome = match self
                .feed
                .current_price(&record.symbol, &record.timeframe)
                .await
            {
                Ok(Some(price)) => record.apply_tick(price, now),
                Ok(None) => record.apply_expiry_check(now),
                Err(e) => {
                    warn!(prediction = %record.id, error = %e, "price feed unavailable");
                    report.errors += 1;
                    record.apply_expiry_check(now)
                }
            };

            if record.version == expected_version {
                continue;
            }

            match self.predictions.update(&record, expected_version).await {
                Ok(()) => {}
                Err(WeaverError::ConcurrencyConflict { .. }) => {
                    // Another poller got here first; its tick stands.
                    debug!(prediction = %record.id, "stale record, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(prediction = %record.id, error = %e, "prediction update failed");
                    report.errors += 1;
                    continue;
                }
            }

            if let Some(outcome) = outcome {
                info!(
                    prediction = %record.id,
                    outcome = outcome.as_str(),
                    "prediction finalized"
                );
                report.finalized += 1;
                if let Err(e) = self.emit_review(&record, outcome).await {
                    warn!(prediction = %record.id, error = %e, "review strand emission failed");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Manually cancel an active prediction and emit its review.
    pub async fn cancel(&self, id: Uuid) -> WeaverResult<PredictionRecord> {
        let mut record = self
            .predictions
            .get(id)
            .await?
            .ok_or(WeaverError::PredictionNotFound(id))?;
        let expected_version = record.version;

        record
            .cancel(Utc::now())
            .map_err(|reason| WeaverError::InvalidStateTransition {
                from: record.status.as_str().to_string(),
                to: "cancelled".to_string(),
                reason,
            })?;

        self.predictions.update(&record, expected_version).await?;
        self.emit_review(&record, PredictionOutcome::Cancelled)
            .await?;
        Ok(record)
    }

    /// Build and store the prediction_review strand for a finalized record.
    ///
    /// Quality scores (persistence, novelty, surprise) are left unset here;
    /// they come from upstream agent scoring, so unenriched reviews never
    /// pass the braiding quality gates on their own.
    async fn emit_review(
        &self,
        record: &PredictionRecord,
        outcome: PredictionOutcome,
    ) -> WeaverResult<()> {
        let mut pattern = record.pattern.clone();
        pattern.asset.get_or_insert_with(|| record.symbol.clone());
        pattern
            .timeframe
            .get_or_insert_with(|| record.timeframe.clone());

        let metrics = OutcomeMetrics {
            success: Some(outcome.is_success()),
            return_pct: record.realized_return(),
            max_drawdown: Some(record.max_drawdown),
            ..OutcomeMetrics::default()
        };

        let strand = Strand::new(StrandPayload::PredictionReview {
            pattern,
            metrics,
            prediction_id: Some(record.id),
            agent: None,
            extra: HashMap::new(),
        });
        let assignments = cluster_grouper::assign_clusters(&strand);
        let review = strand.with_assignments(assignments);
        // The record has already left the active set; ride out transient
        // storage failures instead of dropping the review.
        self.retry
            .execute("review_emission", || async {
                self.strands.insert(&review).await
            })
            .await?;
        Ok(())
    }
}
