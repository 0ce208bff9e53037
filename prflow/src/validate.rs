//! Multi-stage validation of a run's file changes.
//!
//! Syntax and lint run concurrently. Build waits for syntax and test waits for
//! build; a failed prerequisite skips the dependent stage and marks it failed
//! without running its command.

use std::thread;

use tracing::{debug, info, instrument, warn};

use crate::core::lint::parse_lint_output;
use crate::core::syntax::{SourceLanguage, check_syntax};
use crate::core::types::{
    ChangeKind, FileChange, IssueKind, Severity, ValidationIssue, ValidationResult,
};
use crate::io::config::ValidationConfig;
use crate::io::process::display_command;
use crate::io::runner::CommandRunner;

/// Lines of command output quoted in a build or test issue.
const OUTPUT_TAIL_LINES: usize = 20;

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StageReport {
    passed: bool,
    issues: Vec<ValidationIssue>,
}

impl StageReport {
    fn passed() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
        }
    }

    fn skipped() -> Self {
        Self {
            passed: false,
            issues: Vec::new(),
        }
    }
}

/// Validate `changes` and compute their score.
///
/// Never fails: infrastructure problems become issues (build, test, syntax)
/// or are logged and ignored (lint).
#[instrument(skip_all, fields(files = changes.len()))]
pub fn validate_changes<R>(
    runner: &R,
    cfg: &ValidationConfig,
    changes: &[FileChange],
) -> ValidationResult
where
    R: CommandRunner + ?Sized,
{
    let (syntax, lint) = thread::scope(|scope| {
        let lint = scope.spawn(|| lint_stage(runner, cfg));
        let syntax = syntax_stage(runner, changes);
        let lint = lint.join().unwrap_or_else(|_| {
            warn!("lint worker panicked; ignoring lint");
            StageReport::passed()
        });
        (syntax, lint)
    });

    let build = if syntax.passed {
        command_stage(runner, cfg, cfg.build.as_deref(), IssueKind::Build)
    } else {
        debug!("skipping build: syntax errors present");
        StageReport::skipped()
    };

    let test = if build.passed {
        command_stage(runner, cfg, cfg.test.as_deref(), IssueKind::Test)
    } else {
        debug!("skipping tests: build did not pass");
        StageReport::skipped()
    };

    let mut issues = syntax.issues;
    issues.extend(build.issues);
    issues.extend(lint.issues);
    issues.extend(test.issues);

    let result = ValidationResult::new(syntax.passed, build.passed, test.passed, lint.passed, issues);
    info!(
        syntax = result.syntax_valid,
        build = result.builds_successfully,
        lint = result.linting_passes,
        test = result.tests_pass,
        issues = result.issues.len(),
        score = result.score,
        "validation finished"
    );
    result
}

fn syntax_stage<R: CommandRunner + ?Sized>(runner: &R, changes: &[FileChange]) -> StageReport {
    let mut report = StageReport::passed();
    for change in changes {
        if change.kind == ChangeKind::Deleted {
            continue;
        }
        let file = change.path.display().to_string();
        let Some(language) = SourceLanguage::from_path(&change.path) else {
            debug!(file = %file, "no grammar for file; skipping syntax check");
            continue;
        };
        let source = match runner.read_file(&change.path) {
            Ok(source) => source,
            Err(err) => {
                report.passed = false;
                report.issues.push(ValidationIssue::error(
                    IssueKind::Syntax,
                    file,
                    format!("cannot read file: {err:#}"),
                ));
                continue;
            }
        };
        match check_syntax(language, &source) {
            Ok(None) => {}
            Ok(Some(err)) => {
                report.passed = false;
                report.issues.push(
                    ValidationIssue::error(IssueKind::Syntax, file, err.message)
                        .at(err.line, Some(err.column)),
                );
            }
            Err(err) => {
                warn!(file = %file, language = %language, err = %format!("{err:#}"), "syntax check unavailable");
            }
        }
    }
    report
}

fn lint_stage<R: CommandRunner + ?Sized>(runner: &R, cfg: &ValidationConfig) -> StageReport {
    let Some(cmd) = cfg.lint.as_deref() else {
        return StageReport::passed();
    };
    let output = match runner.run_command(cmd, cfg.command_timeout()) {
        Ok(output) => output,
        Err(err) => {
            warn!(command = %display_command(cmd), err = %format!("{err:#}"), "linter could not run; ignoring");
            return StageReport::passed();
        }
    };
    if output.timed_out {
        warn!(command = %display_command(cmd), "linter timed out; ignoring");
        return StageReport::passed();
    }

    let mut combined = output.stdout.clone();
    combined.push('\n');
    combined.push_str(&output.stderr);
    let issues = parse_lint_output(&combined);
    let has_errors = issues
        .iter()
        .any(|issue| issue.severity == Severity::Error);
    StageReport {
        passed: output.success() && !has_errors,
        issues,
    }
}

fn command_stage<R: CommandRunner + ?Sized>(
    runner: &R,
    cfg: &ValidationConfig,
    cmd: Option<&[String]>,
    kind: IssueKind,
) -> StageReport {
    let Some(cmd) = cmd else {
        return StageReport::passed();
    };
    let stage = stage_name(kind);
    let command = display_command(cmd);
    let issue = match runner.run_command(cmd, cfg.command_timeout()) {
        Err(err) => ValidationIssue::error(
            kind,
            &command,
            format!("{stage} command could not start: {err:#}"),
        )
        .with_suggestion(format!(
            "check that `{}` is installed and on PATH",
            cmd.first().map_or("", String::as_str)
        )),
        Ok(output) if output.timed_out => ValidationIssue::error(
            kind,
            &command,
            format!(
                "{stage} command timed out after {}s",
                cfg.command_timeout_secs
            ),
        )
        .with_suggestion("raise validation.command_timeout_secs"),
        Ok(output) if !output.success() => {
            let status = output
                .exit_code
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            let tail = output.tail(OUTPUT_TAIL_LINES);
            let message = if tail.is_empty() {
                format!("{stage} command exited with status {status}")
            } else {
                format!("{stage} command exited with status {status}:\n{tail}")
            };
            ValidationIssue::error(kind, &command, message)
        }
        Ok(_) => return StageReport::passed(),
    };
    warn!(command = %command, "{stage} failed");
    StageReport {
        passed: false,
        issues: vec![issue],
    }
}

fn stage_name(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::Syntax => "syntax",
        IssueKind::Build => "build",
        IssueKind::Test => "test",
        IssueKind::Lint => "lint",
        IssueKind::Runtime => "runtime",
    }
}
