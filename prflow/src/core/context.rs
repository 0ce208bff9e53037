//! Shared mutable state threaded through every action of one run.
//!
//! A [`RunContext`] is owned by a single run. Actions receive `&mut RunContext`
//! and may record decisions and file changes, but history is append-only and
//! only the scheduler appends to it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{ActionResult, FileChange, Phase};

/// Run-level bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub phase: Phase,
    /// Percentage of tracked actions completed, `0..=100`.
    pub progress: u8,
    /// Set when the run ends in [`Phase::Error`].
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    metadata: RunMetadata,
    history: Vec<ActionResult>,
    decisions: BTreeMap<String, Value>,
    file_changes: Vec<FileChange>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            metadata: RunMetadata {
                run_id: run_id.into(),
                phase: Phase::Analyzing,
                progress: 0,
                error: None,
            },
            history: Vec::new(),
            decisions: BTreeMap::new(),
            file_changes: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.metadata.run_id
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn phase(&self) -> Phase {
        self.metadata.phase
    }

    pub fn progress(&self) -> u8 {
        self.metadata.progress
    }

    /// Ordered execution history (oldest first).
    pub fn history(&self) -> &[ActionResult] {
        &self.history
    }

    /// True once any attempt of `kind` has succeeded.
    pub fn has_succeeded(&self, kind: &str) -> bool {
        self.history
            .iter()
            .any(|result| result.success && result.action_type == kind)
    }

    pub fn attempts(&self, kind: &str) -> usize {
        self.history
            .iter()
            .filter(|result| result.action_type == kind)
            .count()
    }

    pub fn decisions(&self) -> &BTreeMap<String, Value> {
        &self.decisions
    }

    pub fn decision(&self, key: &str) -> Option<&Value> {
        self.decisions.get(key)
    }

    pub fn set_decision(&mut self, key: impl Into<String>, value: Value) {
        self.decisions.insert(key.into(), value);
    }

    pub fn file_changes(&self) -> &[FileChange] {
        &self.file_changes
    }

    /// Record a produced file. A later change to the same path replaces the
    /// earlier one in place, keeping first-seen order.
    pub fn add_file_change(&mut self, change: FileChange) {
        match self
            .file_changes
            .iter_mut()
            .find(|existing| existing.path == change.path)
        {
            Some(existing) => existing.kind = change.kind,
            None => self.file_changes.push(change),
        }
    }

    pub(crate) fn record(&mut self, result: ActionResult) {
        self.history.push(result);
    }

    pub(crate) fn set_progress(&mut self, phase: Phase, progress: u8) {
        self.metadata.phase = phase;
        self.metadata.progress = progress.min(100);
    }

    pub(crate) fn complete(&mut self) {
        self.metadata.phase = Phase::Completed;
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.metadata.phase = Phase::Error;
        self.metadata.error = Some(message.into());
    }
}

/// Build a run id from the start time, e.g. `run-20260101T120000Z`.
pub fn new_run_id(now: DateTime<Utc>) -> String {
    format!("run-{}", now.format("%Y%m%dT%H%M%SZ"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn has_succeeded_ignores_failed_attempts() {
        let mut ctx = RunContext::new("run-1");
        ctx.record(ActionResult::failed("analyze", "boom", None));
        assert!(!ctx.has_succeeded("analyze"));
        ctx.record(ActionResult::succeeded("analyze", None, None));
        assert!(ctx.has_succeeded("analyze"));
        assert_eq!(ctx.attempts("analyze"), 2);
    }

    #[test]
    fn file_change_for_same_path_replaces_kind() {
        let mut ctx = RunContext::new("run-1");
        ctx.add_file_change(FileChange::added("src/a.ts"));
        ctx.add_file_change(FileChange::modified("src/b.ts"));
        ctx.add_file_change(FileChange::deleted("src/a.ts"));

        assert_eq!(
            ctx.file_changes(),
            &[FileChange::deleted("src/a.ts"), FileChange::modified("src/b.ts")]
        );
    }

    #[test]
    fn fail_sets_error_phase_and_message() {
        let mut ctx = RunContext::new("run-1");
        ctx.fail("registry corrupted");
        assert_eq!(ctx.phase(), Phase::Error);
        assert_eq!(ctx.metadata().error.as_deref(), Some("registry corrupted"));
    }

    #[test]
    fn run_id_is_derived_from_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(new_run_id(now), "run-20260304T050607Z");
    }
}
