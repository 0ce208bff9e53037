//! The action contract implemented by every unit of scheduled work.

use anyhow::Result;
use serde_json::Value;

use crate::core::context::RunContext;

/// What a successful [`Action::execute`] hands back to the scheduler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutput {
    /// Stored on the [`ActionResult`](crate::core::types::ActionResult) and,
    /// unless the action already set one, as the decision for its kind.
    pub data: Option<Value>,
    pub reasoning: Option<String>,
}

impl ActionOutput {
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            reasoning: None,
        }
    }

    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// A named, prioritised unit of work with prerequisites and a guard.
///
/// Only the scheduler calls [`Action::execute`]; actions never invoke one
/// another. Returning `Err` (or panicking) marks the attempt as failed without
/// stopping the run.
pub trait Action {
    /// Unique key within a registry.
    fn kind(&self) -> &str;

    /// Higher runs first when the scheduler falls back to deterministic selection.
    fn priority(&self) -> i64;

    /// Kinds that must have succeeded before this action becomes ready.
    fn dependencies(&self) -> &[String];

    /// Extra readiness predicate over the current context.
    fn guard(&self, _ctx: &RunContext) -> bool {
        true
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<ActionOutput>;
}
