//! The action scheduler: ready-set resolution, selection and contained execution.
//!
//! One [`Scheduler::run`] drives a single [`RunContext`] until nothing is
//! ready, every terminal action has succeeded, or the iteration cap is hit.
//! Actions run strictly one at a time. An action that errors or panics is
//! recorded as a failed attempt and the loop carries on.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use anyhow::{Result, anyhow, bail};
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::action::Action;
use crate::core::context::RunContext;
use crate::core::extract::{compile_schema, parse};
use crate::core::progress::progress_of;
use crate::core::registry::{ActionRegistry, ready_set};
use crate::core::selector::{AdvisorChoice, SelectionSource, fallback_choice};
use crate::core::types::ActionResult;
use crate::io::advisor::Advisor;
use crate::io::config::PrflowConfig;
use crate::io::prompt::{SELECTION_SCHEMA, SELECTION_SYSTEM, render_selection_prompt};

static SELECTION_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    compile_schema(SELECTION_SCHEMA).expect("selection schema should be valid")
});

/// Limits and stop conditions for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_iterations: u32,
    /// Kinds whose joint success ends the run. Empty disables the check.
    pub terminal_actions: BTreeSet<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            terminal_actions: BTreeSet::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(cfg: &PrflowConfig) -> Self {
        Self {
            max_iterations: cfg.max_iterations,
            terminal_actions: cfg.terminal_actions.iter().cloned().collect(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No action was ready.
    Exhausted,
    /// Every terminal action succeeded.
    TerminalReached,
    /// `max_iterations` actions were executed.
    IterationCap,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Number of actions executed.
    pub iterations: u32,
    pub stop: StopReason,
    /// Kinds that succeeded, in completion order.
    pub succeeded: Vec<String>,
    /// Kinds that were attempted but never succeeded.
    pub failed: Vec<String>,
}

struct Selection<'r> {
    action: &'r dyn Action,
    source: SelectionSource,
    reasoning: Option<String>,
}

pub struct Scheduler<'a> {
    registry: &'a ActionRegistry,
    config: SchedulerConfig,
    advisor: Option<&'a dyn Advisor>,
}

impl<'a> Scheduler<'a> {
    pub fn new(registry: &'a ActionRegistry, config: SchedulerConfig) -> Self {
        Self {
            registry,
            config,
            advisor: None,
        }
    }

    /// Consult `advisor` when more than one action is ready.
    pub fn with_advisor(mut self, advisor: &'a dyn Advisor) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Run the loop to completion.
    ///
    /// Action failures never surface here. `Err` means the loop itself could
    /// not proceed; the context is then left in the error phase with the
    /// message recorded.
    #[instrument(skip_all, fields(run_id = ctx.run_id(), actions = self.registry.len()))]
    pub fn run(&self, ctx: &mut RunContext) -> Result<RunOutcome> {
        match self.run_loop(ctx) {
            Ok((iterations, stop)) => {
                ctx.complete();
                let outcome = summarize(ctx, iterations, stop);
                info!(
                    iterations,
                    stop = ?stop,
                    succeeded = outcome.succeeded.len(),
                    failed = outcome.failed.len(),
                    "run completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(err = %message, "run aborted");
                ctx.fail(message);
                Err(err)
            }
        }
    }

    fn run_loop(&self, ctx: &mut RunContext) -> Result<(u32, StopReason)> {
        for kind in &self.config.terminal_actions {
            if !self.registry.contains(kind) {
                bail!("terminal action '{kind}' is not registered");
            }
        }
        for (kind, dep) in self.registry.unknown_dependencies() {
            warn!(action = %kind, dependency = %dep, "dependency is not registered; action can never run");
        }

        self.update_progress(ctx);
        let mut iterations = 0u32;
        let stop = loop {
            if self.terminal_reached(ctx) {
                break StopReason::TerminalReached;
            }
            let ready = ready_set(self.registry, ctx);
            if ready.is_empty() {
                debug!("no action is ready");
                break StopReason::Exhausted;
            }
            if iterations >= self.config.max_iterations {
                info!(
                    max_iterations = self.config.max_iterations,
                    pending = ready.len(),
                    "iteration cap reached"
                );
                break StopReason::IterationCap;
            }

            let selection = self.select(&ready, ctx)?;
            iterations += 1;
            debug!(
                iteration = iterations,
                action = selection.action.kind(),
                source = ?selection.source,
                "selected action"
            );
            execute(selection, ctx);
            self.update_progress(ctx);
        };
        Ok((iterations, stop))
    }

    fn terminal_reached(&self, ctx: &RunContext) -> bool {
        !self.config.terminal_actions.is_empty()
            && self
                .config
                .terminal_actions
                .iter()
                .all(|kind| ctx.has_succeeded(kind))
    }

    fn update_progress(&self, ctx: &mut RunContext) {
        let (phase, progress) = if self.config.terminal_actions.is_empty() {
            progress_of(self.registry.kinds(), ctx)
        } else {
            progress_of(self.config.terminal_actions.iter().map(String::as_str), ctx)
        };
        ctx.set_progress(phase, progress);
    }

    fn select<'r>(&self, ready: &[&'r dyn Action], ctx: &RunContext) -> Result<Selection<'r>> {
        if let [only] = ready {
            return Ok(Selection {
                action: *only,
                source: SelectionSource::Sole,
                reasoning: None,
            });
        }

        let reason = match self.advisor {
            None => "no advisor configured".to_string(),
            Some(advisor) => match panic::catch_unwind(AssertUnwindSafe(|| {
                consult(advisor, ready, ctx)
            })) {
                Ok(Ok(choice)) => {
                    match ready.iter().find(|action| action.kind() == choice.action) {
                        Some(action) => {
                            return Ok(Selection {
                                action: *action,
                                source: SelectionSource::Advisor {
                                    confidence: choice.confidence,
                                },
                                reasoning: Some(choice.reasoning),
                            });
                        }
                        None => format!("advisor chose '{}' which is not ready", choice.action),
                    }
                }
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => {
                    format!("advisor panicked: {}", panic_message(payload.as_ref()))
                }
            },
        };

        if self.advisor.is_some() {
            warn!(reason = %reason, "advisor selection rejected, falling back to priority");
        }
        let action = fallback_choice(ready, ctx).ok_or_else(|| anyhow!("ready set is empty"))?;
        Ok(Selection {
            action,
            source: SelectionSource::Fallback { reason },
            reasoning: None,
        })
    }
}

fn consult(advisor: &dyn Advisor, ready: &[&dyn Action], ctx: &RunContext) -> Result<AdvisorChoice> {
    let prompt = render_selection_prompt(ready, ctx)?;
    let reply = advisor.generate(&prompt, Some(SELECTION_SYSTEM))?;
    let choice = parse::<AdvisorChoice>(&reply, &SELECTION_VALIDATOR)?;
    Ok(choice)
}

fn execute(selection: Selection<'_>, ctx: &mut RunContext) {
    let action = selection.action;
    let kind = action.kind().to_string();
    info!(action = %kind, "executing action");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.execute(ctx)));
    let result = match outcome {
        Ok(Ok(output)) => {
            if let Some(data) = &output.data
                && ctx.decision(&kind).is_none()
            {
                ctx.set_decision(kind.clone(), data.clone());
            }
            debug!(action = %kind, "action succeeded");
            ActionResult::succeeded(kind, output.data, output.reasoning.or(selection.reasoning))
        }
        Ok(Err(err)) => {
            let message = format!("{err:#}");
            warn!(action = %kind, err = %message, "action failed");
            ActionResult::failed(kind, message, selection.reasoning)
        }
        Err(payload) => {
            let message = format!("action panicked: {}", panic_message(payload.as_ref()));
            warn!(action = %kind, err = %message, "action failed");
            ActionResult::failed(kind, message, selection.reasoning)
        }
    };
    ctx.record(result);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn summarize(ctx: &RunContext, iterations: u32, stop: StopReason) -> RunOutcome {
    let mut succeeded: Vec<String> = Vec::new();
    let mut failed: Vec<String> = Vec::new();
    for result in ctx.history() {
        if result.success && !succeeded.contains(&result.action_type) {
            succeeded.push(result.action_type.clone());
        }
    }
    for result in ctx.history() {
        if !result.success
            && !succeeded.contains(&result.action_type)
            && !failed.contains(&result.action_type)
        {
            failed.push(result.action_type.clone());
        }
    }
    RunOutcome {
        iterations,
        stop,
        succeeded,
        failed,
    }
}
