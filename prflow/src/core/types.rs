//! Shared deterministic types for the scheduler, validator and gate.
//!
//! These types define stable contracts between components. They must not
//! depend on external state and serialize to stable JSON for run reports.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::score::score;

/// Outcome of a single action execution attempt.
///
/// Appended to the run history exactly once per attempt and never modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    pub fn succeeded(
        action_type: impl Into<String>,
        data: Option<Value>,
        reasoning: Option<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            success: true,
            data,
            error: None,
            reasoning,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        action_type: impl Into<String>,
        error: impl Into<String>,
        reasoning: Option<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            reasoning,
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle phase of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No tracked action has completed yet.
    Analyzing,
    /// Some, but not all, tracked actions have completed.
    Planning,
    /// Every tracked action completed; the loop may still be running.
    Executing,
    /// The loop exited normally.
    Completed,
    /// A failure escaped the scheduler's own control logic.
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Analyzing => "analyzing",
            Phase::Planning => "planning",
            Phase::Executing => "executing",
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A file the run produced or touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Added,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modified,
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Deleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Syntax,
    Build,
    Test,
    Lint,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single finding reported by a validation stage. Purely descriptive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            file: file.into(),
            line: None,
            column: None,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn error(kind: IssueKind, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, file, message)
    }

    pub fn at(mut self, line: u32, column: Option<u32>) -> Self {
        self.line = Some(line);
        self.column = column;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Aggregate outcome of one validation run.
///
/// `score` is always recomputable from the other fields; see
/// [`crate::core::score::score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub syntax_valid: bool,
    pub builds_successfully: bool,
    pub tests_pass: bool,
    pub linting_passes: bool,
    pub issues: Vec<ValidationIssue>,
    pub score: f64,
}

impl ValidationResult {
    pub fn new(
        syntax_valid: bool,
        builds_successfully: bool,
        tests_pass: bool,
        linting_passes: bool,
        issues: Vec<ValidationIssue>,
    ) -> Self {
        let mut result = Self {
            syntax_valid,
            builds_successfully,
            tests_pass,
            linting_passes,
            issues,
            score: 0.0,
        };
        result.score = score(&result);
        result
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }
}
