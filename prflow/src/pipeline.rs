//! End-to-end orchestration: schedule actions, validate their output, gate it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::context::RunContext;
use crate::core::gate::{PublishDecision, decide};
use crate::core::types::ValidationResult;
use crate::io::config::ValidationConfig;
use crate::io::runner::CommandRunner;
use crate::scheduler::{RunOutcome, Scheduler};
use crate::validate::validate_changes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run: RunOutcome,
    /// `None` when the run produced no file changes.
    pub validation: Option<ValidationResult>,
    pub decision: PublishDecision,
}

/// Run `scheduler` over `ctx`, then validate and gate whatever it produced.
///
/// Only a fatal scheduler error is returned as `Err`.
#[instrument(skip_all, fields(run_id = ctx.run_id()))]
pub fn run_pipeline<R>(
    scheduler: &Scheduler<'_>,
    runner: &R,
    validation: &ValidationConfig,
    threshold: f64,
    ctx: &mut RunContext,
) -> Result<PipelineOutcome>
where
    R: CommandRunner + ?Sized,
{
    let run = scheduler.run(ctx)?;

    let changes = ctx.file_changes();
    if changes.is_empty() {
        info!("run produced no file changes; withholding");
        return Ok(PipelineOutcome {
            run,
            validation: None,
            decision: PublishDecision::Withhold,
        });
    }

    let result = validate_changes(runner, validation, changes);
    let decision = decide(result.score, threshold, changes.len());
    info!(score = result.score, decision = %decision, "publication decision");
    Ok(PipelineOutcome {
        run,
        validation: Some(result),
        decision,
    })
}
