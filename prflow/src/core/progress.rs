//! Run progress and phase derivation.

use std::collections::BTreeSet;

use crate::core::context::RunContext;
use crate::core::types::Phase;

/// Derive `(phase, progress)` from the tracked kinds that have succeeded.
///
/// `tracked` is the configured terminal set, or every registered kind when no
/// terminal set is configured.
pub fn progress_of<'a, I>(tracked: I, ctx: &RunContext) -> (Phase, u8)
where
    I: IntoIterator<Item = &'a str>,
{
    let tracked: BTreeSet<&str> = tracked.into_iter().collect();
    let total = tracked.len();
    let completed = tracked
        .iter()
        .filter(|kind| ctx.has_succeeded(kind))
        .count();

    if total == 0 || completed == 0 {
        return (Phase::Analyzing, 0);
    }
    let progress = (100.0 * completed as f64 / total as f64).round() as u8;
    if completed < total {
        (Phase::Planning, progress)
    } else {
        (Phase::Executing, progress)
    }
}
