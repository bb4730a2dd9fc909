//! Implementation of the `weaver prediction` commands.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::application::WeaverOrchestrator;
use crate::cli::output::{output, table_with_header, CommandOutput};
use crate::cli::types::PredictionCommands;
use crate::domain::models::{Config, PredictionRecord, PredictionStatus};

#[derive(Debug, Serialize)]
pub struct PredictionListOutput {
    predictions: Vec<PredictionRecord>,
}

impl CommandOutput for PredictionListOutput {
    fn to_human(&self) -> String {
        if self.predictions.is_empty() {
            return "No predictions.".to_string();
        }
        let mut table = table_with_header(&[
            "ID", "Symbol", "TF", "Entry", "Target", "Stop", "Status", "Outcome", "Drawdown",
        ]);
        for p in &self.predictions {
            table.add_row(vec![
                p.id.to_string(),
                p.symbol.clone(),
                p.timeframe.clone(),
                format!("{:.2}", p.entry_price),
                format!("{:.2}", p.target_price),
                format!("{:.2}", p.stop_loss),
                p.status.as_str().to_string(),
                p.outcome.map(|o| o.as_str().to_string()).unwrap_or_default(),
                format!("{:.1}%", p.max_drawdown * 100.0),
            ]);
        }
        table.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionCancelOutput {
    prediction: PredictionRecord,
}

impl CommandOutput for PredictionCancelOutput {
    fn to_human(&self) -> String {
        format!(
            "Cancelled prediction {} ({} {})",
            self.prediction.id, self.prediction.symbol, self.prediction.timeframe
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(command: PredictionCommands, config: Config, json_mode: bool) -> Result<()> {
    let orchestrator = WeaverOrchestrator::connect(config).await?;

    match command {
        PredictionCommands::List { status } => {
            let predictions = match status.as_deref() {
                None => orchestrator.predictions().list_active().await?,
                Some(s) => {
                    let Some(status) = PredictionStatus::from_str(s) else {
                        bail!("unknown status '{s}' (expected active, completed, expired or cancelled)");
                    };
                    orchestrator.predictions().list_by_status(status).await?
                }
            };
            output(&PredictionListOutput { predictions }, json_mode);
        }
        PredictionCommands::Cancel { id } => {
            let prediction = orchestrator.tracker().cancel(id).await?;
            output(&PredictionCancelOutput { prediction }, json_mode);
        }
    }
    Ok(())
}
