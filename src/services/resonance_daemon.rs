//! Resonance background daemon.
//!
//! Runs the feedback loop on two timers:
//! - telemetry sweep: recompute per-family telemetry from recent reviews
//!   and advance (phi, rho) through the bounded update equations
//! - theta tick: fold all family states into the global context field

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Instant};
use tracing::{debug, warn};

use crate::domain::errors::WeaverResult;
use crate::domain::models::{ResonanceConfig, StrandKind};
use crate::domain::ports::{MotifRepository, StrandFilters, StrandRepository};
use crate::services::context_field::ContextField;
use crate::services::resonance_updater::ResonanceUpdater;
use crate::services::telemetry_updater::TelemetryUpdater;

/// Timing and failure policy for the daemon.
#[derive(Debug, Clone)]
pub struct ResonanceDaemonConfig {
    /// Interval between telemetry sweeps.
    pub update_interval: Duration,
    /// Interval between theta recomputations.
    pub theta_interval: Duration,
    /// Whether to sweep immediately on startup.
    pub run_on_startup: bool,
    /// Maximum consecutive sweep failures before stopping.
    pub max_consecutive_failures: u32,
}

impl Default for ResonanceDaemonConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(60),
            theta_interval: Duration::from_secs(600),
            run_on_startup: true,
            max_consecutive_failures: 5,
        }
    }
}

impl ResonanceDaemonConfig {
    pub fn from_resonance(config: &ResonanceConfig) -> Self {
        Self {
            update_interval: Duration::from_secs(config.update_interval_secs),
            theta_interval: Duration::from_secs(config.theta_interval_secs),
            ..Default::default()
        }
    }

    /// Tight intervals for tests.
    pub fn frequent() -> Self {
        Self {
            update_interval: Duration::from_millis(50),
            theta_interval: Duration::from_millis(100),
            run_on_startup: true,
            max_consecutive_failures: 3,
        }
    }
}

/// Event emitted by the resonance daemon.
#[derive(Debug, Clone)]
pub enum ResonanceDaemonEvent {
    Started,
    SweepCompleted {
        run_number: u64,
        families_updated: usize,
        families_skipped: usize,
        duration_ms: u64,
    },
    SweepFailed {
        run_number: u64,
        error: String,
    },
    ThetaUpdated {
        theta: f64,
    },
    Stopped {
        reason: StopReason,
    },
}

/// Reason the daemon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TooManyFailures,
}

/// Running counters, readable through the handle.
#[derive(Debug, Clone, Default)]
pub struct ResonanceDaemonStatus {
    pub running: bool,
    pub total_sweeps: u64,
    pub successful_sweeps: u64,
    pub failed_sweeps: u64,
    pub families_updated: u64,
    pub last_sweep: Option<Instant>,
    pub theta: f64,
}

/// Handle to control a running daemon.
pub struct ResonanceDaemonHandle {
    stop_flag: Arc<AtomicBool>,
    status: Arc<RwLock<ResonanceDaemonStatus>>,
}

impl ResonanceDaemonHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> ResonanceDaemonStatus {
        self.status.read().await.clone()
    }
}

pub struct ResonanceDaemon {
    strands: Arc<dyn StrandRepository>,
    motifs: Arc<dyn MotifRepository>,
    telemetry: TelemetryUpdater,
    updater: ResonanceUpdater,
    context: ContextField,
    window_hours: i64,
    config: ResonanceDaemonConfig,
    status: Arc<RwLock<ResonanceDaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
}

impl ResonanceDaemon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strands: Arc<dyn StrandRepository>,
        motifs: Arc<dyn MotifRepository>,
        telemetry: TelemetryUpdater,
        updater: ResonanceUpdater,
        context: ContextField,
        window_hours: i64,
        config: ResonanceDaemonConfig,
    ) -> Self {
        Self {
            strands,
            motifs,
            telemetry,
            updater,
            context,
            window_hours,
            config,
            status: Arc::new(RwLock::new(ResonanceDaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> ResonanceDaemonHandle {
        ResonanceDaemonHandle {
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
        }
    }

    pub fn context_field(&self) -> ContextField {
        self.context.clone()
    }

    /// Spawn the daemon, returning its event channel.
    pub async fn run(self) -> mpsc::Receiver<ResonanceDaemonEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    async fn run_loop(self, tx: mpsc::Sender<ResonanceDaemonEvent>) {
        {
            let mut status = self.status.write().await;
            status.running = true;
        }
        let _ = tx.send(ResonanceDaemonEvent::Started).await;

        let mut consecutive_failures = 0u32;
        let mut sweep_timer = interval(self.config.update_interval);
        let mut theta_timer = interval(self.config.theta_interval);

        if self.config.run_on_startup {
            self.run_sweep(&tx, &mut consecutive_failures).await;
        }

        let reason = loop {
            tokio::select! {
                _ = sweep_timer.tick() => {
                    if self.stop_flag.load(Ordering::Acquire) {
                        break StopReason::Requested;
                    }
                    self.run_sweep(&tx, &mut consecutive_failures).await;
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        break StopReason::TooManyFailures;
                    }
                }
                _ = theta_timer.tick() => {
                    if self.stop_flag.load(Ordering::Acquire) {
                        break StopReason::Requested;
                    }
                    self.run_theta_tick(&tx).await;
                }
            }

            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }
        };

        {
            let mut status = self.status.write().await;
            status.running = false;
        }
        let _ = tx.send(ResonanceDaemonEvent::Stopped { reason }).await;
    }

    /// Families with a review in the rolling window.
    async fn active_families(&self) -> WeaverResult<BTreeSet<String>> {
        let window_start = Utc::now() - ChronoDuration::hours(self.window_hours);
        let reviews = self
            .strands
            .query(
                StrandFilters::default()
                    .kind(StrandKind::PredictionReview)
                    .created_after(window_start),
            )
            .await?;

        Ok(reviews
            .iter()
            .filter_map(|s| s.payload.pattern())
            .filter_map(|p| p.motif_family.clone())
            .collect())
    }

    /// One telemetry sweep over every active family.
    pub async fn sweep_once(&self) -> WeaverResult<(usize, usize)> {
        let mut updated = 0;
        let mut skipped = 0;

        for family in self.active_families().await? {
            match self.telemetry.compute(&family).await? {
                Some(telemetry) => {
                    self.updater.apply(&family, telemetry).await?;
                    updated += 1;
                }
                None => {
                    skipped += 1;
                }
            }
        }
        Ok((updated, skipped))
    }

    async fn run_sweep(
        &self,
        tx: &mpsc::Sender<ResonanceDaemonEvent>,
        consecutive_failures: &mut u32,
    ) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_sweeps += 1;
            status.total_sweeps
        };

        let start = Instant::now();
        match self.sweep_once().await {
            Ok((updated, skipped)) => {
                *consecutive_failures = 0;
                {
                    let mut status = self.status.write().await;
                    status.successful_sweeps += 1;
                    status.families_updated += updated as u64;
                    status.last_sweep = Some(Instant::now());
                }
                debug!(run_number, updated, skipped, "resonance sweep finished");
                let _ = tx
                    .send(ResonanceDaemonEvent::SweepCompleted {
                        run_number,
                        families_updated: updated,
                        families_skipped: skipped,
                        duration_ms: start.elapsed().as_millis() as u64,
                    })
                    .await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                {
                    let mut status = self.status.write().await;
                    status.failed_sweeps += 1;
                }
                warn!(run_number, error = %e, "resonance sweep failed");
                let _ = tx
                    .send(ResonanceDaemonEvent::SweepFailed {
                        run_number,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    async fn run_theta_tick(&self, tx: &mpsc::Sender<ResonanceDaemonEvent>) {
        match self.motifs.list().await {
            Ok(states) => {
                let theta = self.context.tick(&states).await;
                {
                    let mut status = self.status.write().await;
                    status.theta = theta;
                }
                let _ = tx.send(ResonanceDaemonEvent::ThetaUpdated { theta }).await;
            }
            Err(e) => {
                // Theta keeps its previous value; a missed tick is not a
                // sweep failure.
                warn!(error = %e, "theta recomputation failed");
            }
        }
    }

    pub async fn status(&self) -> ResonanceDaemonStatus {
        self.status.read().await.clone()
    }

    pub fn config(&self) -> &ResonanceDaemonConfig {
        &self.config
    }
}
