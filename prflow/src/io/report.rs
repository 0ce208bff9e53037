//! Run reports written to `.prflow/reports/<run_id>.json`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::context::{RunContext, RunMetadata};
use crate::core::gate::PublishDecision;
use crate::core::types::{ActionResult, FileChange, ValidationResult};
use crate::io::config::write_atomic;
use crate::pipeline::PipelineOutcome;
use crate::scheduler::RunOutcome;

/// Everything a reviewer needs to audit one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub outcome: RunOutcome,
    pub history: Vec<ActionResult>,
    pub decisions: BTreeMap<String, Value>,
    pub file_changes: Vec<FileChange>,
    pub validation: Option<ValidationResult>,
    pub decision: PublishDecision,
    pub generated_at: DateTime<Utc>,
}

impl RunReport {
    pub fn new(ctx: &RunContext, outcome: &PipelineOutcome, generated_at: DateTime<Utc>) -> Self {
        Self {
            metadata: ctx.metadata().clone(),
            outcome: outcome.run.clone(),
            history: ctx.history().to_vec(),
            decisions: ctx.decisions().clone(),
            file_changes: ctx.file_changes().to_vec(),
            validation: outcome.validation.clone(),
            decision: outcome.decision,
            generated_at,
        }
    }
}

/// Atomically write a report as pretty JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    debug!(path = %path.display(), run_id = %report.metadata.run_id, "writing run report");
    let mut buf = serde_json::to_string_pretty(report).context("serialize run report")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
