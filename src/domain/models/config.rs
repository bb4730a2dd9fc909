//! Configuration model.
//!
//! Defaults here are the documented operating point; everything is
//! overridable through `.weaver/config.yaml` and `WEAVER_*` environment
//! variables (see `infrastructure::config`).

use serde::{Deserialize, Serialize};

use super::motif::ResonanceCoefficients;

/// Top-level configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub braiding: BraidingConfig,
    pub resonance: ResonanceConfig,
    pub tracker: TrackerConfig,
    pub price_feed: PriceFeedConfig,
    pub heuristics: HeuristicsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path.
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".weaver/weaver.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
    /// json | pretty
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Promotion gates and pass cadence for the braiding pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BraidingConfig {
    /// Minimum unconsumed strands a cluster needs before promotion.
    pub min_strands: usize,
    /// Aggregate quality gates, averaged across the cluster.
    pub min_persistence: f64,
    pub min_novelty: f64,
    pub min_surprise: f64,
    /// Seconds between background braiding passes.
    pub pass_interval_secs: u64,
}

impl Default for BraidingConfig {
    fn default() -> Self {
        Self {
            min_strands: 3,
            min_persistence: 0.6,
            min_novelty: 0.5,
            min_surprise: 0.4,
            pass_interval_secs: 300,
        }
    }
}

/// Resonance subsystem tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    pub coefficients: ResonanceCoefficients,
    /// Rolling telemetry window in hours.
    pub window_hours: i64,
    /// Minimum samples before telemetry updates a family.
    pub min_samples: usize,
    /// Confidence above which an outcome counts as confirmed.
    pub confirmation_confidence: f64,
    /// Return below which an outcome counts as a contradiction.
    pub contradiction_return_threshold: f64,
    /// Seconds between telemetry/resonance sweeps.
    pub update_interval_secs: u64,
    /// Seconds between global context-field (theta) ticks.
    pub theta_interval_secs: u64,
    /// Per-family cap in queue ordering.
    pub family_cap: usize,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            coefficients: ResonanceCoefficients::default(),
            window_hours: 24,
            min_samples: 10,
            confirmation_confidence: 0.7,
            contradiction_return_threshold: -0.05,
            update_interval_secs: 60,
            theta_interval_secs: 600,
            family_cap: 3,
        }
    }
}

/// Prediction lifecycle polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds between polls of active predictions.
    pub poll_interval_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { poll_interval_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceFeedConfig {
    /// Base URL of the quote endpoint.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Aggregation multipliers inherited from upstream detection agents.
/// Configuration constants, not invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Volume considered elevated relative to its rolling baseline.
    pub volume_baseline_factor: f64,
    /// Tolerance band around a level for a retest to count.
    pub retest_tolerance: f64,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            volume_baseline_factor: 1.5,
            retest_tolerance: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_operating_point() {
        let config = Config::default();
        assert_eq!(config.braiding.min_strands, 3);
        assert!((config.braiding.min_persistence - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.resonance.window_hours, 24);
        assert_eq!(config.resonance.min_samples, 10);
        assert_eq!(config.resonance.family_cap, 3);
        assert_eq!(config.resonance.theta_interval_secs, 600);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"braiding": {"min_strands": 5}}"#).unwrap();
        assert_eq!(config.braiding.min_strands, 5);
        // Untouched sections keep defaults.
        assert!((config.braiding.min_novelty - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.database.max_connections, 5);
    }
}
