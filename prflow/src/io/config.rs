//! prflow configuration stored under `.prflow/config.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::core::gate::DEFAULT_CONFIDENCE_THRESHOLD;

/// prflow configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields take their
/// defaults; unknown fields are rejected so typos fail loudly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PrflowConfig {
    /// Upper bound on scheduler iterations per run.
    pub max_iterations: u32,

    /// Minimum validation score for a publish-ready decision.
    pub confidence_threshold: f64,

    /// Action kinds whose success ends the run. Empty means "run until
    /// nothing is ready".
    pub terminal_actions: Vec<String>,

    pub validation: ValidationConfig,

    pub advisor: AdvisorConfig,

    /// Command-backed actions, in registration order.
    pub actions: Vec<ActionConfig>,
}

impl Default for PrflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            terminal_actions: Vec::new(),
            validation: ValidationConfig::default(),
            advisor: AdvisorConfig::default(),
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Build command (e.g. `["npm","run","build"]`). Unset means the stage passes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<Vec<String>>,

    /// Timeout applied to each build, lint and test command.
    pub command_timeout_secs: u64,

    /// Truncate captured command output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            build: None,
            lint: None,
            test: None,
            command_timeout_secs: 5 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl ValidationConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AdvisorConfig {
    /// Command that reads a prompt on stdin and answers on stdout. Unset
    /// disables the advisor; ties are then broken by priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    pub timeout_secs: u64,

    pub output_limit_bytes: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 2 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

/// One command-backed action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    pub kind: String,

    #[serde(default)]
    pub priority: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    pub command: Vec<String>,

    /// Only run when this decision key holds a truthy value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_decision: Option<String>,

    /// Files the command writes, recorded as modified on success.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<PathBuf>,

    /// Overrides `validation.command_timeout_secs` for this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl PrflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if self.validation.command_timeout_secs == 0 {
            return Err(anyhow!("validation.command_timeout_secs must be > 0"));
        }
        if self.validation.output_limit_bytes == 0 {
            return Err(anyhow!("validation.output_limit_bytes must be > 0"));
        }
        for (name, command) in [
            ("validation.build", &self.validation.build),
            ("validation.lint", &self.validation.lint),
            ("validation.test", &self.validation.test),
            ("advisor.command", &self.advisor.command),
        ] {
            if let Some(command) = command {
                ensure_command(name, command)?;
            }
        }
        if self.advisor.timeout_secs == 0 {
            return Err(anyhow!("advisor.timeout_secs must be > 0"));
        }
        if self.advisor.output_limit_bytes == 0 {
            return Err(anyhow!("advisor.output_limit_bytes must be > 0"));
        }

        let mut kinds = HashSet::new();
        for action in &self.actions {
            if action.kind.trim().is_empty() {
                bail!("actions: kind must be non-empty");
            }
            if !kinds.insert(action.kind.as_str()) {
                bail!("actions: duplicate kind '{}'", action.kind);
            }
            ensure_command(&format!("actions.{}.command", action.kind), &action.command)?;
            if action.timeout_secs == Some(0) {
                bail!("actions.{}.timeout_secs must be > 0", action.kind);
            }
        }
        for action in &self.actions {
            for dep in &action.depends_on {
                if !kinds.contains(dep.as_str()) {
                    bail!(
                        "actions.{}.depends_on refers to unknown action '{dep}'",
                        action.kind
                    );
                }
            }
        }
        for kind in &self.terminal_actions {
            if !kinds.contains(kind.as_str()) {
                bail!("terminal_actions refers to unknown action '{kind}'");
            }
        }
        Ok(())
    }
}

fn ensure_command(name: &str, command: &[String]) -> Result<()> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(anyhow!("{name} must be a non-empty array")),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PrflowConfig::default()`.
pub fn load_config(path: &Path) -> Result<PrflowConfig> {
    if !path.exists() {
        let cfg = PrflowConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PrflowConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PrflowConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: &str, deps: &[&str]) -> ActionConfig {
        ActionConfig {
            kind: kind.to_string(),
            priority: 0,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            command: vec!["true".to_string()],
            when_decision: None,
            produces: Vec::new(),
            timeout_secs: None,
        }
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PrflowConfig::default());
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.confidence_threshold, 0.7);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = PrflowConfig::default();
        cfg.validation.build = Some(vec!["npm".to_string(), "run".to_string(), "build".to_string()]);
        cfg.actions = vec![action("analyze", &[]), action("generate", &["analyze"])];
        cfg.terminal_actions = vec!["generate".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn parses_action_tables() {
        let cfg: PrflowConfig = toml::from_str(
            r#"
terminal_actions = ["open-pr"]

[validation]
lint = ["npx", "eslint", "-f", "unix", "."]

[[actions]]
kind = "analyze"
priority = 100
command = ["./scripts/analyze.sh"]

[[actions]]
kind = "open-pr"
priority = 10
depends_on = ["analyze"]
command = ["./scripts/open-pr.sh"]
when_decision = "analyze"
produces = ["src/App.tsx"]
"#,
        )
        .expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.actions.len(), 2);
        assert_eq!(cfg.actions[1].depends_on, vec!["analyze".to_string()]);
        assert_eq!(cfg.actions[1].produces, vec![PathBuf::from("src/App.tsx")]);
        assert_eq!(cfg.validation.command_timeout_secs, 300);
    }

    #[test]
    fn parallel_actions_flag_is_rejected() {
        let err = toml::from_str::<PrflowConfig>("enable_parallel_actions = true\n")
            .expect_err("unknown field");
        assert!(err.to_string().contains("enable_parallel_actions"));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut cfg = PrflowConfig::default();
        cfg.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = PrflowConfig::default();
        cfg.max_iterations = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PrflowConfig::default();
        cfg.validation.test = Some(Vec::new());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_action_graph() {
        let mut cfg = PrflowConfig::default();
        cfg.actions = vec![action("a", &[]), action("a", &[])];
        let err = cfg.validate().expect_err("duplicate");
        assert!(err.to_string().contains("duplicate kind 'a'"));

        let mut cfg = PrflowConfig::default();
        cfg.actions = vec![action("a", &["ghost"])];
        let err = cfg.validate().expect_err("unknown dep");
        assert!(err.to_string().contains("ghost"));

        let mut cfg = PrflowConfig::default();
        cfg.actions = vec![action("a", &[])];
        cfg.terminal_actions = vec!["b".to_string()];
        assert!(cfg.validate().is_err());
    }
}
