//! Stable exit codes for prflow CLI commands.

use crate::core::gate::PublishDecision;

/// Command succeeded; for gated commands the decision is publish-ready.
pub const OK: i32 = 0;
/// Command failed due to invalid config, arguments, or a fatal run error.
pub const INVALID: i32 = 1;
/// Gated result is publish-draft.
pub const DRAFT: i32 = 2;
/// Gated result is withhold.
pub const WITHHOLD: i32 = 3;

/// Exit code reporting `decision`.
pub fn for_decision(decision: PublishDecision) -> i32 {
    match decision {
        PublishDecision::PublishReady => OK,
        PublishDecision::PublishDraft => DRAFT,
        PublishDecision::Withhold => WITHHOLD,
    }
}
