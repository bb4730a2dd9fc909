//! Implementation of the `weaver init` command.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::{create_pool, Migrator};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Default project config written by init. Values mirror
/// `Config::default()`; uncommented keys are the ones most often tuned.
const CONFIG_TEMPLATE: &str = r"# Weaver project configuration.
# Overrides: .weaver/local.yaml, then WEAVER_* environment variables.

database:
  path: .weaver/weaver.db
  max_connections: 5

logging:
  level: info
  format: pretty

braiding:
  min_strands: 3
  min_persistence: 0.6
  min_novelty: 0.5
  min_surprise: 0.4
  pass_interval_secs: 300

resonance:
  window_hours: 24
  min_samples: 10
  family_cap: 3
  update_interval_secs: 60
  theta_interval_secs: 600

tracker:
  poll_interval_secs: 60

price_feed:
  base_url: http://localhost:8787
  timeout_secs: 10
";

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_initialized: bool,
    pub migrations_applied: usize,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push("Wrote .weaver/config.yaml".to_string());
        }
        if self.database_initialized {
            lines.push(format!(
                "Database initialized ({} migration(s) applied)",
                self.migrations_applied
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(force: bool, json_mode: bool) -> Result<()> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let weaver_dir = current_dir.join(".weaver");
    let config_path = weaver_dir.join("config.yaml");

    if config_path.exists() && !force {
        let out = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: current_dir,
            config_written: false,
            database_initialized: false,
            migrations_applied: 0,
        };
        output(&out, json_mode);
        return Ok(());
    }

    fs::create_dir_all(&weaver_dir)
        .await
        .context("Failed to create .weaver directory")?;
    fs::write(&config_path, CONFIG_TEMPLATE)
        .await
        .context("Failed to write config.yaml")?;

    let config = Config::default();
    let pool = create_pool(&config.database.path, None)
        .await
        .context("Failed to create database")?;
    let applied = Migrator::new(pool)
        .run()
        .await
        .context("Failed to run migrations")?;

    let out = InitOutput {
        success: true,
        message: "Weaver initialized.".to_string(),
        initialized_path: current_dir,
        config_written: true,
        database_initialized: true,
        migrations_applied: applied,
    };
    output(&out, json_mode);
    Ok(())
}
