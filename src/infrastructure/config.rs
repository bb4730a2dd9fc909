use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid min_strands: {0}. Must be at least 2")]
    InvalidMinStrands(usize),

    #[error("Invalid quality gate {name}: {value}. Must be within [0, 1]")]
    InvalidQualityGate { name: &'static str, value: f64 },

    #[error("Invalid rho bounds: [{0}, {1}]. Lower bound must be positive and below upper")]
    InvalidRhoBounds(f64, f64),

    #[error("Invalid window_hours: {0}. Must be positive")]
    InvalidWindow(i64),

    #[error("Invalid min_samples: {0}. Cannot be 0")]
    InvalidMinSamples(usize),

    #[error("Invalid family_cap: {0}. Cannot be 0")]
    InvalidFamilyCap(usize),

    #[error("Price feed base_url cannot be empty")]
    EmptyPriceFeedUrl,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .weaver/config.yaml (project config, created by init)
    /// 3. .weaver/local.yaml (project local overrides, optional)
    /// 4. Environment variables (WEAVER_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.weaver/) so multiple
    /// pipelines can run on one machine against different databases.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".weaver/config.yaml"))
            .merge(Yaml::file(".weaver/local.yaml"))
            .merge(Env::prefixed("WEAVER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.braiding.min_strands < 2 {
            return Err(ConfigError::InvalidMinStrands(config.braiding.min_strands));
        }
        for (name, value) in [
            ("min_persistence", config.braiding.min_persistence),
            ("min_novelty", config.braiding.min_novelty),
            ("min_surprise", config.braiding.min_surprise),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidQualityGate { name, value });
            }
        }

        let coefficients = &config.resonance.coefficients;
        if coefficients.rho_min <= 0.0 || coefficients.rho_min >= coefficients.rho_max {
            return Err(ConfigError::InvalidRhoBounds(
                coefficients.rho_min,
                coefficients.rho_max,
            ));
        }
        if config.resonance.window_hours <= 0 {
            return Err(ConfigError::InvalidWindow(config.resonance.window_hours));
        }
        if config.resonance.min_samples == 0 {
            return Err(ConfigError::InvalidMinSamples(config.resonance.min_samples));
        }
        if config.resonance.family_cap == 0 {
            return Err(ConfigError::InvalidFamilyCap(config.resonance.family_cap));
        }

        if config.price_feed.base_url.is_empty() {
            return Err(ConfigError::EmptyPriceFeedUrl);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.path, ".weaver/weaver.db");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
braiding:
  min_strands: 5
  min_persistence: 0.7
resonance:
  window_hours: 48
database:
  path: /custom/weaver.db
  max_connections: 8
logging:
  level: debug
  format: json
";
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
            .expect("YAML should parse");

        assert_eq!(config.braiding.min_strands, 5);
        assert!((config.braiding.min_persistence - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.resonance.window_hours, 48);
        assert_eq!(config.database.path, "/custom/weaver.db");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.logging.level, "debug");
        // Untouched sections keep defaults.
        assert_eq!(config.resonance.min_samples, 10);
        assert_eq!(config.tracker.poll_interval_secs, 60);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_min_strands_floor() {
        let mut config = Config::default();
        config.braiding.min_strands = 1;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMinStrands(1))
        ));
    }

    #[test]
    fn test_validate_quality_gate_range() {
        let mut config = Config::default();
        config.braiding.min_novelty = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidQualityGate {
                name: "min_novelty",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rho_bounds() {
        let mut config = Config::default();
        config.resonance.coefficients.rho_min = 2.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRhoBounds(_, _))
        ));
    }

    #[test]
    fn test_validate_zero_family_cap() {
        let mut config = Config::default();
        config.resonance.family_cap = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidFamilyCap(0))
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "braiding:\n  min_strands: 4\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "braiding:\n  min_strands: 6\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.braiding.min_strands, 6, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }
}
