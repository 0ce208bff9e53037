//! Deterministic selection logic for the ready set.

use serde::Deserialize;

use crate::core::action::Action;
use crate::core::context::RunContext;

/// Pick the ready action with the highest priority.
///
/// Ties go to the earliest registered action; `ready` must be in registration
/// order (as returned by [`ready_set`](crate::core::registry::ready_set)).
pub fn highest_priority<'r>(ready: &[&'r dyn Action]) -> Option<&'r dyn Action> {
    let mut best: Option<&'r dyn Action> = None;
    for &action in ready {
        match best {
            Some(current) if current.priority() >= action.priority() => {}
            _ => best = Some(action),
        }
    }
    best
}

/// Deterministic pick when the advisor is absent or unusable.
///
/// Actions with the fewest attempts so far in this run come first, so an
/// action that keeps failing cannot starve independent work. Among those,
/// [`highest_priority`] decides.
pub fn fallback_choice<'r>(ready: &[&'r dyn Action], ctx: &RunContext) -> Option<&'r dyn Action> {
    let fewest = ready
        .iter()
        .map(|action| ctx.attempts(action.kind()))
        .min()?;
    let candidates: Vec<&'r dyn Action> = ready
        .iter()
        .copied()
        .filter(|action| ctx.attempts(action.kind()) == fewest)
        .collect();
    highest_priority(&candidates)
}

/// Structured reply expected from the reasoning advisor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdvisorChoice {
    pub action: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// How the scheduler arrived at the action it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionSource {
    /// Only one action was ready.
    Sole,
    /// The advisor picked among several ready actions.
    Advisor { confidence: f64 },
    /// Deterministic priority order was used.
    Fallback { reason: String },
}
