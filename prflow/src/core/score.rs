//! Confidence score for a validation run.
//!
//! The weights are calibration constants kept for behavioral compatibility.

use crate::core::types::{Severity, ValidationResult};

pub const SYNTAX_PENALTY: f64 = 0.4;
pub const BUILD_PENALTY: f64 = 0.3;
pub const TEST_PENALTY: f64 = 0.2;
pub const LINT_PENALTY: f64 = 0.1;
pub const ERROR_ISSUE_PENALTY: f64 = 0.05;
pub const WARNING_ISSUE_PENALTY: f64 = 0.02;

/// Reduce stage flags and issues to a score in `[0, 1]`.
///
/// Reads only the flags and the issue list; the stored `score` field is ignored.
pub fn score(result: &ValidationResult) -> f64 {
    let mut score = 1.0;
    if !result.syntax_valid {
        score -= SYNTAX_PENALTY;
    }
    if !result.builds_successfully {
        score -= BUILD_PENALTY;
    }
    if !result.tests_pass {
        score -= TEST_PENALTY;
    }
    if !result.linting_passes {
        score -= LINT_PENALTY;
    }
    score -= ERROR_ISSUE_PENALTY * result.count_severity(Severity::Error) as f64;
    score -= WARNING_ISSUE_PENALTY * result.count_severity(Severity::Warning) as f64;
    score.clamp(0.0, 1.0)
}
