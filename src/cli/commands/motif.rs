//! Implementation of the `weaver motif` commands.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::application::WeaverOrchestrator;
use crate::cli::output::{output, table_with_header, CommandOutput};
use crate::cli::types::MotifCommands;
use crate::domain::models::{Config, MotifState};
use crate::services::RankedCandidate;

#[derive(Debug, Serialize)]
pub struct MotifListOutput {
    states: Vec<MotifState>,
}

impl CommandOutput for MotifListOutput {
    fn to_human(&self) -> String {
        if self.states.is_empty() {
            return "No pattern families tracked yet.".to_string();
        }
        let mut table = table_with_header(&[
            "Family", "Phi", "Rho", "Surprise", "Samples", "Score", "Parent",
        ]);
        for s in &self.states {
            table.add_row(vec![
                s.family.clone(),
                format!("{:.3}", s.phi),
                format!("{:.3}", s.rho),
                format!("{:.2}", s.telemetry.surprise),
                s.telemetry.sample_count.to_string(),
                format!("{:.3}", s.score()),
                s.parent_id.map(|p| p.to_string()).unwrap_or_default(),
            ]);
        }
        table.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct MotifShowOutput {
    state: MotifState,
}

impl CommandOutput for MotifShowOutput {
    fn to_human(&self) -> String {
        let s = &self.state;
        format!(
            "Family: {}\n  phi: {:.4}\n  rho: {:.4}\n  telemetry: sr={:.2} cr={:.2} xr={:.2} surprise={:.2} samples={}\n  score: {:.4}\n  version: {}\n  updated: {}",
            s.family,
            s.phi,
            s.rho,
            s.telemetry.sr,
            s.telemetry.cr,
            s.telemetry.xr,
            s.telemetry.surprise,
            s.telemetry.sample_count,
            s.score(),
            s.version,
            s.updated_at.to_rfc3339(),
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ExperimentQueueOutput {
    ranked: Vec<RankedCandidate>,
}

impl CommandOutput for ExperimentQueueOutput {
    fn to_human(&self) -> String {
        if self.ranked.is_empty() {
            return "No experiment candidates in the current window.".to_string();
        }
        let mut table = table_with_header(&[
            "Family", "Description", "Phi", "Rho", "Surprise", "Score",
        ]);
        for r in &self.ranked {
            table.add_row(vec![
                r.candidate.motif_family.clone(),
                r.candidate.description.clone(),
                format!("{:.3}", r.candidate.phi),
                format!("{:.3}", r.candidate.rho),
                format!("{:.2}", r.candidate.surprise),
                format!("{:.3}", r.score),
            ]);
        }
        table.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(command: MotifCommands, config: Config, json_mode: bool) -> Result<()> {
    let orchestrator = WeaverOrchestrator::connect(config).await?;
    let motifs = orchestrator.motifs();

    match command {
        MotifCommands::List => {
            let mut states = motifs.list().await?;
            states.sort_by(|a, b| {
                b.score()
                    .partial_cmp(&a.score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            output(&MotifListOutput { states }, json_mode);
        }
        MotifCommands::Show { family } => {
            let Some(state) = motifs.get_by_family(&family).await? else {
                bail!("no motif state for family '{family}'");
            };
            output(&MotifShowOutput { state }, json_mode);
        }
        MotifCommands::Queue => {
            let ranked = orchestrator.experiment_queue().build().await?;
            output(&ExperimentQueueOutput { ranked }, json_mode);
        }
    }
    Ok(())
}
