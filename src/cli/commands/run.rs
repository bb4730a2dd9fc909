//! Implementation of the `weaver run` command: the long-running pipeline.

use anyhow::{Context, Result};
use tracing::info;

use crate::application::WeaverOrchestrator;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub braiding_passes: u64,
    pub braids_created: u64,
    pub predictions_finalized: u64,
    pub theta: f64,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "Pipeline stopped.\n  braiding passes: {}\n  braids created: {}\n  predictions finalized: {}\n  theta: {:.3}",
            self.braiding_passes, self.braids_created, self.predictions_finalized, self.theta
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let mut orchestrator = WeaverOrchestrator::connect(config).await?;
    orchestrator.start().await?;

    info!("weaver pipeline running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    orchestrator.stop().await?;

    let stats = orchestrator.stats().await;
    let out = RunOutput {
        braiding_passes: stats.braiding_passes,
        braids_created: stats.braids_created,
        predictions_finalized: stats.predictions_finalized,
        theta: stats.theta,
    };
    output(&out, json_mode);
    Ok(())
}
