//! Prediction lifecycle tests: polling against a scripted feed, terminal
//! transitions, and review strand emission.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{setup_pool, ScriptedPriceFeed};
use uuid::Uuid;
use weaver::adapters::sqlite::{SqlitePredictionRepository, SqliteStrandRepository};
use weaver::services::PredictionTracker;
use weaver::{
    ClusterDimension, PatternDescriptor, PredictionOutcome, PredictionRecord, PredictionStatus,
    PredictionRepository, Strand, StrandFilters, StrandKind, StrandRepository, WeaverError,
    WeaverResult,
};

fn record(symbol: &str, entry: f64, target: f64, stop: f64, max_minutes: i64) -> PredictionRecord {
    PredictionRecord::new(
        symbol,
        "1h",
        entry,
        target,
        stop,
        max_minutes,
        PatternDescriptor {
            asset: Some(symbol.to_string()),
            timeframe: Some("1h".to_string()),
            pattern_type: Some("volume_spike".to_string()),
            motif_family: Some("volume_spike".to_string()),
            ..Default::default()
        },
    )
}

struct Harness {
    predictions: Arc<SqlitePredictionRepository>,
    strands: Arc<dyn StrandRepository>,
    tracker: PredictionTracker,
}

async fn harness(feed: ScriptedPriceFeed) -> Harness {
    let pool = setup_pool().await;
    let predictions = Arc::new(SqlitePredictionRepository::new(pool.clone()));
    let strands: Arc<dyn StrandRepository> = Arc::new(SqliteStrandRepository::new(pool));
    let tracker = PredictionTracker::new(predictions.clone(), strands.clone(), Arc::new(feed));
    Harness {
        predictions,
        strands,
        tracker,
    }
}

async fn reviews(strands: &dyn StrandRepository) -> Vec<Strand> {
    strands
        .query(StrandFilters::default().kind(StrandKind::PredictionReview))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_open_registers_record_and_strand() {
    let h = harness(ScriptedPriceFeed::new()).await;
    let record = record("BTC", 100.0, 110.0, 95.0, 60);
    h.tracker.open(&record).await.unwrap();

    let active = h.predictions.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, record.id);

    let strands = h
        .strands
        .query(StrandFilters::default().kind(StrandKind::Prediction))
        .await
        .unwrap();
    assert_eq!(strands.len(), 1);
    assert!(strands[0]
        .cluster_assignments
        .iter()
        .any(|a| a.dimension == ClusterDimension::Asset && a.cluster_key == "BTC"));
}

#[tokio::test]
async fn test_target_hit_emits_successful_review() {
    let h = harness(ScriptedPriceFeed::new().script("BTC", vec![105.0, 110.0])).await;
    let record = record("BTC", 100.0, 110.0, 95.0, 600);
    h.tracker.open(&record).await.unwrap();

    let first = h.tracker.poll_once().await.unwrap();
    assert_eq!(first.polled, 1);
    assert_eq!(first.finalized, 0);

    let second = h.tracker.poll_once().await.unwrap();
    assert_eq!(second.finalized, 1);

    let stored = h.predictions.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PredictionStatus::Completed);
    assert_eq!(stored.outcome, Some(PredictionOutcome::TargetHit));

    let reviews = reviews(h.strands.as_ref()).await;
    assert_eq!(reviews.len(), 1);
    let metrics = reviews[0].payload.metrics().unwrap();
    assert_eq!(metrics.success, Some(true));
    assert!((metrics.return_pct.unwrap() - 0.10).abs() < 1e-9);
}

#[tokio::test]
async fn test_stop_hit_emits_failed_review() {
    let h = harness(ScriptedPriceFeed::new().script("ETH", vec![95.0])).await;
    let record = record("ETH", 100.0, 110.0, 95.0, 600);
    h.tracker.open(&record).await.unwrap();

    let report = h.tracker.poll_once().await.unwrap();
    assert_eq!(report.finalized, 1);

    let stored = h.predictions.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.outcome, Some(PredictionOutcome::StopHit));

    let reviews = reviews(h.strands.as_ref()).await;
    assert_eq!(reviews[0].payload.metrics().unwrap().success, Some(false));

    // Terminal records leave the active set; further polls are no-ops.
    let after = h.tracker.poll_once().await.unwrap();
    assert_eq!(after.polled, 0);
    assert_eq!(reviews.len(), 1);
}

#[tokio::test]
async fn test_drawdown_limit_forces_finalization() {
    // Stop far below so the drawdown watermark fires first.
    let h = harness(ScriptedPriceFeed::new().script("SOL", vec![80.0])).await;
    let record = record("SOL", 100.0, 150.0, 40.0, 600);
    h.tracker.open(&record).await.unwrap();

    h.tracker.poll_once().await.unwrap();

    let stored = h.predictions.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.outcome, Some(PredictionOutcome::MaxDrawdownAchieved));
    assert!(stored.max_drawdown > 0.15);

    let reviews = reviews(h.strands.as_ref()).await;
    let metrics = reviews[0].payload.metrics().unwrap();
    assert_eq!(metrics.success, Some(false));
    assert!(metrics.max_drawdown.unwrap() > 0.15);
}

#[tokio::test]
async fn test_missing_quote_still_expires() {
    // Feed knows nothing about this symbol; time budget of zero elapses
    // immediately.
    let h = harness(ScriptedPriceFeed::new()).await;
    let record = record("DOGE", 100.0, 110.0, 95.0, 0);
    h.tracker.open(&record).await.unwrap();

    let report = h.tracker.poll_once().await.unwrap();
    assert_eq!(report.finalized, 1);

    let stored = h.predictions.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PredictionStatus::Expired);
    assert_eq!(stored.outcome, Some(PredictionOutcome::Expired));
}

/// Strand store that rejects the first `failures` review inserts with a
/// transient database error, then behaves normally.
struct FlakyStrandStore {
    inner: Arc<dyn StrandRepository>,
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyStrandStore {
    fn new(inner: Arc<dyn StrandRepository>, failures: usize) -> Self {
        Self {
            inner,
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    fn review_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StrandRepository for FlakyStrandStore {
    async fn insert(&self, strand: &Strand) -> WeaverResult<()> {
        if strand.kind() == StrandKind::PredictionReview
            && self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures
        {
            return Err(WeaverError::Database("database is locked".to_string()));
        }
        self.inner.insert(strand).await
    }

    async fn get(&self, id: Uuid) -> WeaverResult<Option<Strand>> {
        self.inner.get(id).await
    }

    async fn query(&self, filters: StrandFilters) -> WeaverResult<Vec<Strand>> {
        self.inner.query(filters).await
    }

    async fn set_assignment_consumed(
        &self,
        strand_id: Uuid,
        dimension: ClusterDimension,
        braid_level: u32,
    ) -> WeaverResult<()> {
        self.inner
            .set_assignment_consumed(strand_id, dimension, braid_level)
            .await
    }

    async fn insert_braid_with_consumption(
        &self,
        braid: &Strand,
        dimension: ClusterDimension,
        source_level: u32,
    ) -> WeaverResult<bool> {
        self.inner
            .insert_braid_with_consumption(braid, dimension, source_level)
            .await
    }

    async fn count_family_occurrences(
        &self,
        family: &str,
        after: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> WeaverResult<u64> {
        self.inner
            .count_family_occurrences(family, after, exclude)
            .await
    }
}

#[tokio::test]
async fn test_review_survives_transient_insert_failure() {
    let pool = setup_pool().await;
    let predictions = Arc::new(SqlitePredictionRepository::new(pool.clone()));
    let store = Arc::new(FlakyStrandStore::new(
        Arc::new(SqliteStrandRepository::new(pool)),
        2,
    ));
    let feed = ScriptedPriceFeed::new().script("BTC", vec![110.0]);
    let tracker = PredictionTracker::new(predictions.clone(), store.clone(), Arc::new(feed));

    let record = record("BTC", 100.0, 110.0, 95.0, 600);
    tracker.open(&record).await.unwrap();

    // The terminal status is committed before the review is written; a
    // locked database while writing the review must not drop it, because
    // the record has already left the active set and will never be
    // re-finalized.
    let report = tracker.poll_once().await.unwrap();
    assert_eq!(report.finalized, 1);
    assert_eq!(report.errors, 0);

    let stored = predictions.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PredictionStatus::Completed);

    let reviews = reviews(store.as_ref()).await;
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].payload.metrics().unwrap().success, Some(true));
    assert_eq!(store.review_attempts(), 3);
}

#[tokio::test]
async fn test_cancel_is_terminal_and_single_shot() {
    let h = harness(ScriptedPriceFeed::new()).await;
    let record = record("BTC", 100.0, 110.0, 95.0, 600);
    h.tracker.open(&record).await.unwrap();

    let cancelled = h.tracker.cancel(record.id).await.unwrap();
    assert_eq!(cancelled.status, PredictionStatus::Cancelled);

    let reviews = reviews(h.strands.as_ref()).await;
    assert_eq!(reviews.len(), 1);

    let err = h.tracker.cancel(record.id).await.unwrap_err();
    assert!(matches!(err, WeaverError::InvalidStateTransition { .. }));

    let unknown = h.tracker.cancel(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(unknown, WeaverError::PredictionNotFound(_)));
}
