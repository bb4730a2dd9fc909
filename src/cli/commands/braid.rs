//! Implementation of the `weaver braid` command: one synchronous pass.

use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use crate::application::WeaverOrchestrator;
use crate::cli::output::{output, table_with_header, truncate, CommandOutput};
use crate::domain::models::{Config, StrandPayload};

#[derive(Debug, Serialize)]
struct BraidRow {
    id: Uuid,
    level: u32,
    braid_type: String,
    sources: usize,
    lesson: String,
}

#[derive(Debug, Serialize)]
pub struct BraidOutput {
    pub created: usize,
    pub errors: usize,
    braids: Vec<BraidRow>,
}

impl CommandOutput for BraidOutput {
    fn to_human(&self) -> String {
        if self.braids.is_empty() {
            return format!("No clusters qualified ({} error(s)).", self.errors);
        }
        let mut table = table_with_header(&["ID", "Level", "Type", "Sources", "Lesson"]);
        for row in &self.braids {
            table.add_row(vec![
                row.id.to_string(),
                row.level.to_string(),
                row.braid_type.clone(),
                row.sources.to_string(),
                truncate(&row.lesson, 60),
            ]);
        }
        format!(
            "Created {} braid(s), {} error(s).\n{table}",
            self.created, self.errors
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let orchestrator = WeaverOrchestrator::connect(config).await?;
    let report = orchestrator.run_braiding_pass().await?;

    let braids = report
        .new_braids
        .iter()
        .map(|b| BraidRow {
            id: b.id,
            level: b.braid_level,
            braid_type: match &b.payload {
                StrandPayload::Braid { braid_type, .. } => braid_type.clone(),
                _ => String::new(),
            },
            sources: b.source_strand_ids.len(),
            lesson: b.lesson.clone().unwrap_or_default(),
        })
        .collect();

    let out = BraidOutput {
        created: report.created(),
        errors: report.errors,
        braids,
    };
    output(&out, json_mode);
    Ok(())
}
