//! Linter output parsing.
//!
//! Two common layouts are recognized:
//! - one line per finding: `path:line[:col]: severity[rule]: message`
//!   (eslint `unix` formatter, ruff, golangci-lint, gcc-style tools);
//! - rustc/clippy style: `severity[code]: message` followed by ` --> path:line:col`.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{IssueKind, Severity, ValidationIssue};

static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<file>[^:\s][^:]*):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<sev>error|warning|warn|info|note)(?:\[[^\]]*\])?:?\s+(?P<msg>.+)$",
    )
    .expect("inline lint regex is valid")
});

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sev>error|warning)(?:\[(?P<code>[^\]]+)\])?: (?P<msg>.+)$")
        .expect("header lint regex is valid")
});

static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*--> (?P<file>[^:]+):(?P<line>\d+):(?P<col>\d+)")
        .expect("arrow lint regex is valid")
});

/// Turn linter output into issues, in output order.
///
/// Lines that match neither layout are ignored.
pub fn parse_lint_output(output: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut pending: Option<(Severity, String)> = None;

    for line in output.lines() {
        let line = line.trim_end();
        if let Some(caps) = INLINE_RE.captures(line) {
            pending = None;
            let mut issue = ValidationIssue::new(
                IssueKind::Lint,
                severity(&caps["sev"]),
                caps["file"].trim(),
                caps["msg"].trim(),
            );
            issue.line = caps["line"].parse().ok();
            issue.column = caps.name("col").and_then(|m| m.as_str().parse().ok());
            issues.push(issue);
            continue;
        }
        if let Some(caps) = HEADER_RE.captures(line) {
            let message = match caps.name("code") {
                Some(code) => format!("{} [{}]", &caps["msg"], code.as_str()),
                None => caps["msg"].to_string(),
            };
            pending = Some((severity(&caps["sev"]), message));
            continue;
        }
        if let Some(caps) = ARROW_RE.captures(line)
            && let Some((sev, message)) = pending.take()
        {
            let mut issue = ValidationIssue::new(IssueKind::Lint, sev, &caps["file"], message);
            issue.line = caps["line"].parse().ok();
            issue.column = caps["col"].parse().ok();
            issues.push(issue);
        }
    }
    issues
}

fn severity(raw: &str) -> Severity {
    match raw.to_ascii_lowercase().as_str() {
        "error" => Severity::Error,
        "warning" | "warn" => Severity::Warning,
        _ => Severity::Info,
    }
}
