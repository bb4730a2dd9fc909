//! Weaver orchestrator: wires the storage adapters to the pipeline
//! services and runs the background workers.
//!
//! Three workers run concurrently once started:
//! - braiding pass loop (cluster, gate, promote across levels)
//! - prediction tracker poll loop
//! - resonance daemon (telemetry sweeps and theta ticks)

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::adapters::sqlite::{
    create_pool, Migrator, PoolConfig, SqliteMotifRepository, SqlitePredictionRepository,
    SqliteStrandRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{
    MotifRepository, PredictionRepository, StaticLessonGenerator, StrandRepository,
};
use crate::services::{
    BraidLevelManager, BraidPromoter, ContextField, ExperimentQueue, PredictionTracker,
    ResonanceDaemon, ResonanceDaemonConfig, ResonanceDaemonHandle, ResonanceUpdater,
    TelemetryUpdater,
};

/// Snapshot of orchestrator activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorStats {
    pub braiding_passes: u64,
    pub braids_created: u64,
    pub predictions_finalized: u64,
    pub theta: f64,
}

struct Counters {
    braiding_passes: u64,
    braids_created: u64,
    predictions_finalized: u64,
}

/// Owns the pool, the repositories, and the background worker handles.
pub struct WeaverOrchestrator {
    pool: SqlitePool,
    config: Config,
    strands: Arc<dyn StrandRepository>,
    motifs: Arc<dyn MotifRepository>,
    predictions: Arc<dyn PredictionRepository>,
    tracker: Arc<PredictionTracker>,
    context: ContextField,
    counters: Arc<RwLock<Counters>>,
    shutdown_tx: broadcast::Sender<()>,
    worker_handles: Vec<JoinHandle<()>>,
    daemon_handle: Option<ResonanceDaemonHandle>,
}

impl WeaverOrchestrator {
    /// Open the database, run migrations, and wire the services. No
    /// background work starts until `start` is called.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = create_pool(
            &config.database.path,
            Some(PoolConfig {
                max_connections: config.database.max_connections,
                ..PoolConfig::default()
            }),
        )
        .await
        .context("Failed to open database")?;

        Migrator::new(pool.clone())
            .run()
            .await
            .context("Failed to run migrations")?;

        Self::with_pool(pool, config)
    }

    /// Wire services over an existing pool (tests use an in-memory one).
    pub fn with_pool(pool: SqlitePool, config: Config) -> Result<Self> {
        let strands: Arc<dyn StrandRepository> =
            Arc::new(SqliteStrandRepository::new(pool.clone()));
        let motifs: Arc<dyn MotifRepository> = Arc::new(SqliteMotifRepository::new(pool.clone()));
        let predictions: Arc<dyn PredictionRepository> =
            Arc::new(SqlitePredictionRepository::new(pool.clone()));

        let feed = Arc::new(
            crate::adapters::http::HttpPriceFeed::new(&config.price_feed)
                .context("Failed to build price feed client")?,
        );
        let tracker = Arc::new(PredictionTracker::new(
            predictions.clone(),
            strands.clone(),
            feed,
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            pool,
            config,
            strands,
            motifs,
            predictions,
            tracker,
            context: ContextField::new(),
            counters: Arc::new(RwLock::new(Counters {
                braiding_passes: 0,
                braids_created: 0,
                predictions_finalized: 0,
            })),
            shutdown_tx,
            worker_handles: Vec::new(),
            daemon_handle: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn strands(&self) -> Arc<dyn StrandRepository> {
        self.strands.clone()
    }

    pub fn motifs(&self) -> Arc<dyn MotifRepository> {
        self.motifs.clone()
    }

    pub fn predictions(&self) -> Arc<dyn PredictionRepository> {
        self.predictions.clone()
    }

    pub fn tracker(&self) -> Arc<PredictionTracker> {
        self.tracker.clone()
    }

    /// Experiment queue over the configured resonance settings.
    pub fn experiment_queue(&self) -> ExperimentQueue {
        ExperimentQueue::new(
            self.strands.clone(),
            self.motifs.clone(),
            self.config.resonance.clone(),
        )
    }

    fn level_manager(&self) -> BraidLevelManager {
        let promoter = BraidPromoter::new(
            self.strands.clone(),
            Arc::new(StaticLessonGenerator),
            self.config.braiding.clone(),
        );
        BraidLevelManager::new(self.strands.clone(), promoter)
    }

    /// Run one braiding pass synchronously.
    pub async fn run_braiding_pass(&self) -> Result<crate::services::BraidReport> {
        let report = self.level_manager().run_pass().await?;
        let mut counters = self.counters.write().await;
        counters.braiding_passes += 1;
        counters.braids_created += report.created() as u64;
        Ok(report)
    }

    /// Start the background workers.
    pub async fn start(&mut self) -> Result<()> {
        if !self.worker_handles.is_empty() {
            return Ok(());
        }

        info!(
            braid_interval_secs = self.config.braiding.pass_interval_secs,
            poll_interval_secs = self.config.tracker.poll_interval_secs,
            "starting weaver workers"
        );

        self.spawn_braiding_loop();
        self.spawn_tracker_loop();
        self.spawn_resonance_daemon().await;

        Ok(())
    }

    fn spawn_braiding_loop(&mut self) {
        let manager = self.level_manager();
        let counters = self.counters.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut timer = interval(Duration::from_secs(self.config.braiding.pass_interval_secs));

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        match manager.run_pass().await {
                            Ok(report) => {
                                let mut counters = counters.write().await;
                                counters.braiding_passes += 1;
                                counters.braids_created += report.created() as u64;
                            }
                            Err(e) => warn!(error = %e, "braiding pass failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("braiding loop received shutdown signal");
                        break;
                    }
                }
            }
        });
        self.worker_handles.push(handle);
    }

    fn spawn_tracker_loop(&mut self) {
        let tracker = self.tracker.clone();
        let counters = self.counters.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut timer = interval(Duration::from_secs(self.config.tracker.poll_interval_secs));

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        match tracker.poll_once().await {
                            Ok(report) => {
                                if report.finalized > 0 {
                                    let mut counters = counters.write().await;
                                    counters.predictions_finalized += report.finalized as u64;
                                }
                            }
                            Err(e) => warn!(error = %e, "tracker poll failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("tracker loop received shutdown signal");
                        break;
                    }
                }
            }
        });
        self.worker_handles.push(handle);
    }

    async fn spawn_resonance_daemon(&mut self) {
        let telemetry =
            TelemetryUpdater::new(self.strands.clone(), self.config.resonance.clone());
        let updater = ResonanceUpdater::new(
            self.motifs.clone(),
            self.config.resonance.coefficients,
        );
        let daemon = ResonanceDaemon::new(
            self.strands.clone(),
            self.motifs.clone(),
            telemetry,
            updater,
            self.context.clone(),
            self.config.resonance.window_hours,
            ResonanceDaemonConfig::from_resonance(&self.config.resonance),
        );

        self.daemon_handle = Some(daemon.handle());

        // Drain the daemon's event channel so it never blocks on a full
        // buffer; events are already logged at source.
        let mut events = daemon.run().await;
        let handle = tokio::spawn(async move {
            while events.recv().await.is_some() {}
        });
        self.worker_handles.push(handle);
    }

    /// Signal every worker and wait for them to wind down.
    pub async fn stop(&mut self) -> Result<()> {
        if self.worker_handles.is_empty() {
            return Ok(());
        }

        info!("stopping weaver workers");
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = &self.daemon_handle {
            handle.stop();
        }

        for handle in self.worker_handles.drain(..) {
            match tokio::time::timeout(Duration::from_secs(30), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = ?e, "worker panicked"),
                Err(_) => warn!("worker shutdown timeout"),
            }
        }
        self.daemon_handle = None;

        info!("weaver workers stopped");
        Ok(())
    }

    pub async fn stats(&self) -> OrchestratorStats {
        let counters = self.counters.read().await;
        OrchestratorStats {
            braiding_passes: counters.braiding_passes,
            braids_created: counters.braids_created,
            predictions_finalized: counters.predictions_finalized,
            theta: self.context.theta().await,
        }
    }
}
