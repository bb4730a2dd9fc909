//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use weaver::adapters::sqlite::{create_test_pool, Migrator};
use weaver::domain::ports::LessonGenerator;
use weaver::services::cluster_grouper;
use weaver::{
    OutcomeMetrics, PatternDescriptor, PriceFeed, Strand, StrandPayload, WeaverError,
    WeaverResult,
};

/// Fresh in-memory database with the full schema applied.
pub async fn setup_pool() -> SqlitePool {
    let pool = create_test_pool().await.expect("in-memory pool");
    Migrator::new(pool.clone()).run().await.expect("migrations");
    pool
}

/// Builder for prediction_review strands with braid-quality scores.
pub struct ReviewBuilder {
    pattern: PatternDescriptor,
    metrics: OutcomeMetrics,
    agent: Option<String>,
}

impl ReviewBuilder {
    pub fn new(asset: &str, timeframe: &str, pattern_type: &str) -> Self {
        Self {
            pattern: PatternDescriptor {
                asset: Some(asset.to_string()),
                timeframe: Some(timeframe.to_string()),
                pattern_type: Some(pattern_type.to_string()),
                ..Default::default()
            },
            metrics: OutcomeMetrics {
                success: Some(true),
                confidence: Some(0.8),
                return_pct: Some(0.04),
                max_drawdown: Some(0.02),
                // Above the default promotion gates.
                persistence_score: Some(0.7),
                novelty_score: Some(0.6),
                surprise_rating: Some(0.5),
            },
            agent: Some("pattern_miner".to_string()),
        }
    }

    pub fn family(mut self, family: &str) -> Self {
        self.pattern.motif_family = Some(family.to_string());
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.metrics.success = Some(success);
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.metrics.confidence = Some(confidence);
        self
    }

    pub fn return_pct(mut self, return_pct: f64) -> Self {
        self.metrics.return_pct = Some(return_pct);
        self
    }

    pub fn quality(mut self, persistence: f64, novelty: f64, surprise: f64) -> Self {
        self.metrics.persistence_score = Some(persistence);
        self.metrics.novelty_score = Some(novelty);
        self.metrics.surprise_rating = Some(surprise);
        self
    }

    pub fn agent(mut self, agent: &str) -> Self {
        self.agent = Some(agent.to_string());
        self
    }

    /// Build the strand with cluster assignments attached.
    pub fn build(self) -> Strand {
        let strand = Strand::new(StrandPayload::PredictionReview {
            pattern: self.pattern,
            metrics: self.metrics,
            prediction_id: None,
            agent: self.agent,
            extra: HashMap::new(),
        });
        let assignments = cluster_grouper::assign_clusters(&strand);
        strand.with_assignments(assignments)
    }
}

/// Price feed that replays scripted quotes per symbol, in order. Returns
/// the last quote once the script runs out, `None` for unknown symbols.
pub struct ScriptedPriceFeed {
    quotes: Mutex<HashMap<String, Vec<f64>>>,
    cursor: Mutex<HashMap<String, usize>>,
}

impl ScriptedPriceFeed {
    pub fn new() -> Self {
        Self {
            quotes: Mutex::new(HashMap::new()),
            cursor: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(self, symbol: &str, prices: Vec<f64>) -> Self {
        self.quotes
            .lock()
            .unwrap()
            .insert(symbol.to_string(), prices);
        self
    }
}

#[async_trait]
impl PriceFeed for ScriptedPriceFeed {
    async fn current_price(&self, symbol: &str, _timeframe: &str) -> WeaverResult<Option<f64>> {
        let quotes = self.quotes.lock().unwrap();
        let Some(prices) = quotes.get(symbol) else {
            return Ok(None);
        };
        let mut cursor = self.cursor.lock().unwrap();
        let index = cursor.entry(symbol.to_string()).or_insert(0);
        let price = prices
            .get(*index)
            .or_else(|| prices.last())
            .copied();
        *index += 1;
        Ok(price)
    }
}

/// Lesson generator that counts invocations.
pub struct CountingLessonGenerator {
    calls: AtomicUsize,
}

impl CountingLessonGenerator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LessonGenerator for CountingLessonGenerator {
    async fn generate(&self, strands: &[Strand], braid_type: &str) -> WeaverResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{braid_type}: {} strands compressed", strands.len()))
    }
}

/// Lesson generator that always fails; promotion must leave sources
/// untouched.
pub struct FailingLessonGenerator;

#[async_trait]
impl LessonGenerator for FailingLessonGenerator {
    async fn generate(&self, _strands: &[Strand], _braid_type: &str) -> WeaverResult<String> {
        Err(WeaverError::LessonFailed("backend offline".to_string()))
    }
}

/// Lesson generator whose backend rejects braid-of-braid clusters until
/// `heal` is called. Models an outage that defers higher-level
/// promotions while level 1 keeps braiding.
pub struct RecoveringLessonGenerator {
    healthy: AtomicBool,
}

impl RecoveringLessonGenerator {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(false),
        }
    }

    pub fn heal(&self) {
        self.healthy.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LessonGenerator for RecoveringLessonGenerator {
    async fn generate(&self, strands: &[Strand], braid_type: &str) -> WeaverResult<String> {
        let compresses_braids = strands.iter().any(|s| s.braid_level > 1);
        if compresses_braids && !self.healthy.load(Ordering::SeqCst) {
            return Err(WeaverError::LessonFailed("backend offline".to_string()));
        }
        Ok(format!("{braid_type}: {} strands compressed", strands.len()))
    }
}
