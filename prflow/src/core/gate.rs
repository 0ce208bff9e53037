//! Publication gate: converts a validation score into a publish decision.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishDecision {
    /// Publish as ready for review.
    PublishReady,
    /// Publish, flagged for mandatory human review.
    PublishDraft,
    /// Nothing trustworthy to publish.
    Withhold,
}

impl PublishDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishDecision::PublishReady => "publish-ready",
            PublishDecision::PublishDraft => "publish-draft",
            PublishDecision::Withhold => "withhold",
        }
    }
}

impl fmt::Display for PublishDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide how to publish a run that produced `change_count` file changes.
///
/// - No changes: withhold, whatever the score.
/// - `score == 0`: withhold, even against a zero threshold.
/// - `score >= threshold`: ready.
/// - otherwise: draft.
pub fn decide(score: f64, threshold: f64, change_count: usize) -> PublishDecision {
    if change_count == 0 || score <= 0.0 {
        return PublishDecision::Withhold;
    }
    if score >= threshold {
        PublishDecision::PublishReady
    } else {
        PublishDecision::PublishDraft
    }
}
