//! Prediction lifecycle domain model.
//!
//! A prediction record is created when a forecasting agent emits a
//! prediction strand, mutated on every polling tick, and finalized in
//! place on a terminal transition. Records are never deleted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::strand::PatternDescriptor;

/// Status of a prediction in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    /// Being polled against the price feed.
    Active,
    /// Finalized with a market outcome.
    Completed,
    /// Finalized because max_time elapsed.
    Expired,
    /// Finalized by manual cancellation.
    Cancelled,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Why a prediction finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionOutcome {
    TargetHit,
    StopHit,
    Expired,
    MaxDrawdownAchieved,
    Cancelled,
}

impl PredictionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetHit => "target_hit",
            Self::StopHit => "stop_hit",
            Self::Expired => "expired",
            Self::MaxDrawdownAchieved => "max_drawdown_achieved",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "target_hit" => Some(Self::TargetHit),
            "stop_hit" => Some(Self::StopHit),
            "expired" => Some(Self::Expired),
            "max_drawdown_achieved" => Some(Self::MaxDrawdownAchieved),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Status implied by this outcome.
    pub fn status(&self) -> PredictionStatus {
        match self {
            Self::TargetHit | Self::StopHit | Self::MaxDrawdownAchieved => {
                PredictionStatus::Completed
            }
            Self::Expired => PredictionStatus::Expired,
            Self::Cancelled => PredictionStatus::Cancelled,
        }
    }

    /// Whether this counts as a successful forecast.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::TargetHit)
    }
}

/// Drawdown fraction beyond which a prediction is forcibly finalized.
pub const MAX_DRAWDOWN_LIMIT: f64 = 0.15;

/// A live trading forecast tracked to a finalized outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Unique identifier
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: String,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    /// Lifetime budget in minutes.
    pub max_time_minutes: i64,
    /// Pattern identity, carried onto the emitted review strand.
    pub pattern: PatternDescriptor,
    pub status: PredictionStatus,
    /// Latest observed price.
    pub current_price: Option<f64>,
    /// Monotonically non-decreasing drawdown fraction.
    pub max_drawdown: f64,
    pub outcome: Option<PredictionOutcome>,
    pub final_price: Option<f64>,
    pub final_at: Option<DateTime<Utc>>,
    /// When created
    pub created_at: DateTime<Utc>,
    /// Version for optimistic locking
    pub version: u64,
}

impl PredictionRecord {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        entry_price: f64,
        target_price: f64,
        stop_loss: f64,
        max_time_minutes: i64,
        pattern: PatternDescriptor,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            entry_price,
            target_price,
            stop_loss,
            max_time_minutes,
            pattern,
            status: PredictionStatus::Active,
            current_price: None,
            max_drawdown: 0.0,
            outcome: None,
            final_price: None,
            final_at: None,
            created_at: Utc::now(),
            version: 1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Minutes elapsed since creation at `now`.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_minutes()
    }

    /// Apply one polling tick. Updates the drawdown watermark, checks the
    /// terminal conditions in order, and finalizes in place when one
    /// fires. Returns the outcome if this tick was terminal.
    ///
    /// Transition order: target, stop, expiry, drawdown.
    pub fn apply_tick(&mut self, price: f64, now: DateTime<Utc>) -> Option<PredictionOutcome> {
        if self.is_terminal() {
            return None;
        }

        self.current_price = Some(price);
        if price < self.entry_price && self.entry_price > 0.0 {
            let drawdown = (self.entry_price - price) / self.entry_price;
            self.max_drawdown = self.max_drawdown.max(drawdown);
        }
        self.version += 1;

        let outcome = if price >= self.target_price {
            PredictionOutcome::TargetHit
        } else if price <= self.stop_loss {
            PredictionOutcome::StopHit
        } else if self.elapsed_minutes(now) >= self.max_time_minutes {
            PredictionOutcome::Expired
        } else if self.max_drawdown > MAX_DRAWDOWN_LIMIT {
            PredictionOutcome::MaxDrawdownAchieved
        } else {
            return None;
        };

        self.finalize(outcome, Some(price), now);
        Some(outcome)
    }

    /// Handle expiry when no price is available this tick.
    pub fn apply_expiry_check(&mut self, now: DateTime<Utc>) -> Option<PredictionOutcome> {
        if self.is_terminal() || self.elapsed_minutes(now) < self.max_time_minutes {
            return None;
        }
        self.finalize(PredictionOutcome::Expired, self.current_price, now);
        Some(PredictionOutcome::Expired)
    }

    /// Manual cancellation, valid from Active at any time.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), String> {
        if self.is_terminal() {
            return Err(format!(
                "cannot cancel prediction in terminal status {}",
                self.status.as_str()
            ));
        }
        self.finalize(PredictionOutcome::Cancelled, self.current_price, now);
        Ok(())
    }

    fn finalize(&mut self, outcome: PredictionOutcome, price: Option<f64>, now: DateTime<Utc>) {
        self.status = outcome.status();
        self.outcome = Some(outcome);
        self.final_price = price;
        self.final_at = Some(now);
        self.version += 1;
    }

    /// Realized return fraction relative to entry, if finalized with a price.
    pub fn realized_return(&self) -> Option<f64> {
        let final_price = self.final_price?;
        if self.entry_price <= 0.0 {
            return None;
        }
        Some((final_price - self.entry_price) / self.entry_price)
    }

    /// Deadline after which the record expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::minutes(self.max_time_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PredictionRecord {
        PredictionRecord::new(
            "BTC",
            "1h",
            100.0,
            110.0,
            95.0,
            60,
            PatternDescriptor::default(),
        )
    }

    #[test]
    fn test_target_hit() {
        let mut p = record();
        let t30 = p.created_at + Duration::minutes(30);
        assert_eq!(p.apply_tick(105.0, p.created_at + Duration::minutes(10)), None);
        assert_eq!(p.apply_tick(110.0, t30), Some(PredictionOutcome::TargetHit));
        assert_eq!(p.status, PredictionStatus::Completed);
        assert_eq!(p.final_price, Some(110.0));
        assert!(p.outcome.unwrap().is_success());
    }

    #[test]
    fn test_stop_hit_is_sticky() {
        let mut p = record();
        let t10 = p.created_at + Duration::minutes(10);
        assert_eq!(p.apply_tick(95.0, t10), Some(PredictionOutcome::StopHit));
        assert_eq!(p.status, PredictionStatus::Completed);
        // Later price action is ignored once finalized.
        assert_eq!(p.apply_tick(120.0, t10 + Duration::minutes(5)), None);
        assert_eq!(p.outcome, Some(PredictionOutcome::StopHit));
    }

    #[test]
    fn test_expiry() {
        let mut p = record();
        let t61 = p.created_at + Duration::minutes(61);
        assert_eq!(p.apply_tick(102.0, p.created_at + Duration::minutes(59)), None);
        assert_eq!(p.apply_tick(102.0, t61), Some(PredictionOutcome::Expired));
        assert_eq!(p.status, PredictionStatus::Expired);
    }

    #[test]
    fn test_drawdown_monotone_and_limit() {
        let mut p = record();
        let t = p.created_at + Duration::minutes(5);
        p.apply_tick(96.0, t);
        assert!((p.max_drawdown - 0.04).abs() < 1e-9);
        // Recovery does not lower the watermark.
        p.apply_tick(99.0, t + Duration::minutes(1));
        assert!((p.max_drawdown - 0.04).abs() < 1e-9);
        // Price above entry never contributes drawdown.
        p.apply_tick(105.0, t + Duration::minutes(2));
        assert!((p.max_drawdown - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_forces_finalization() {
        // Wide stop so the drawdown limit fires first.
        let mut p = PredictionRecord::new(
            "ETH",
            "4h",
            100.0,
            130.0,
            50.0,
            600,
            PatternDescriptor::default(),
        );
        let t = p.created_at + Duration::minutes(5);
        let outcome = p.apply_tick(84.0, t);
        assert_eq!(outcome, Some(PredictionOutcome::MaxDrawdownAchieved));
        assert_eq!(p.status, PredictionStatus::Completed);
    }

    #[test]
    fn test_cancel_only_from_active() {
        let mut p = record();
        assert!(p.cancel(Utc::now()).is_ok());
        assert_eq!(p.status, PredictionStatus::Cancelled);
        assert_eq!(p.outcome, Some(PredictionOutcome::Cancelled));
        assert!(p.cancel(Utc::now()).is_err());
    }

    #[test]
    fn test_status_roundtrip() {
        for s in [
            PredictionStatus::Active,
            PredictionStatus::Completed,
            PredictionStatus::Expired,
            PredictionStatus::Cancelled,
        ] {
            assert_eq!(PredictionStatus::from_str(s.as_str()), Some(s));
        }
        for o in [
            PredictionOutcome::TargetHit,
            PredictionOutcome::StopHit,
            PredictionOutcome::Expired,
            PredictionOutcome::MaxDrawdownAchieved,
            PredictionOutcome::Cancelled,
        ] {
            assert_eq!(PredictionOutcome::from_str(o.as_str()), Some(o));
        }
    }

    #[test]
    fn test_realized_return() {
        let mut p = record();
        p.apply_tick(110.0, p.created_at + Duration::minutes(1));
        assert!((p.realized_return().unwrap() - 0.10).abs() < 1e-9);
    }
}
