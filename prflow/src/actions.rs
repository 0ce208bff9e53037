//! Config-declared actions backed by external commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tracing::debug;

use crate::core::action::{Action, ActionOutput};
use crate::core::context::RunContext;
use crate::core::registry::ActionRegistry;
use crate::core::types::FileChange;
use crate::io::config::{ActionConfig, PrflowConfig};
use crate::io::process::display_command;
use crate::io::runner::CommandRunner;

/// Runs a command; success is exit status zero.
///
/// Stdout becomes the action's decision: parsed as JSON when possible,
/// otherwise kept as trimmed text.
pub struct CommandAction {
    kind: String,
    priority: i64,
    dependencies: Vec<String>,
    command: Vec<String>,
    when_decision: Option<String>,
    produces: Vec<PathBuf>,
    timeout: Duration,
    runner: Arc<dyn CommandRunner>,
}

impl CommandAction {
    pub fn new(cfg: &ActionConfig, default_timeout: Duration, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            kind: cfg.kind.clone(),
            priority: cfg.priority,
            dependencies: cfg.depends_on.clone(),
            command: cfg.command.clone(),
            when_decision: cfg.when_decision.clone(),
            produces: cfg.produces.clone(),
            timeout: cfg.timeout_secs.map_or(default_timeout, Duration::from_secs),
            runner,
        }
    }
}

impl Action for CommandAction {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn guard(&self, ctx: &RunContext) -> bool {
        match &self.when_decision {
            None => true,
            Some(key) => ctx.decision(key).is_some_and(is_truthy),
        }
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<ActionOutput> {
        let output = self
            .runner
            .run_command(&self.command, self.timeout)
            .with_context(|| format!("run {}", display_command(&self.command)))?;
        if output.timed_out {
            bail!("command timed out after {}s", self.timeout.as_secs());
        }
        if !output.success() {
            bail!(
                "command exited with status {:?}: {}",
                output.exit_code,
                output.tail(5)
            );
        }

        for path in &self.produces {
            ctx.add_file_change(FileChange::modified(path.clone()));
        }
        let stdout = output.stdout.trim();
        let decision = serde_json::from_str::<Value>(stdout)
            .unwrap_or_else(|_| Value::String(stdout.to_string()));
        debug!(action = %self.kind, produced = self.produces.len(), "command action finished");
        ctx.set_decision(self.kind.clone(), decision);

        Ok(ActionOutput::with_data(json!({
            "exit_code": output.exit_code,
            "duration_ms": output.duration_ms,
        })))
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Build a registry holding one [`CommandAction`] per configured action.
pub fn registry_from_config(
    cfg: &PrflowConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    let default_timeout = cfg.validation.command_timeout();
    for action in &cfg.actions {
        registry
            .register(CommandAction::new(action, default_timeout, Arc::clone(&runner)))
            .with_context(|| format!("register action '{}'", action.kind))?;
    }
    Ok(registry)
}
