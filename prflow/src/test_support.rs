//! Test doubles for actions, the advisor and the command runner.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};

use crate::core::action::{Action, ActionOutput};
use crate::core::context::RunContext;
use crate::core::types::FileChange;
use crate::io::advisor::Advisor;
use crate::io::process::{CommandOutput, display_command};
use crate::io::runner::CommandRunner;

type Guard = Box<dyn Fn(&RunContext) -> bool>;
type Body = Box<dyn Fn(&mut RunContext) -> Result<ActionOutput>>;

/// Shared call counters of a [`ScriptedAction`], readable after it moved into a registry.
#[derive(Debug, Clone, Default)]
pub struct CallCounters {
    guard: Arc<AtomicUsize>,
    execute: Arc<AtomicUsize>,
}

impl CallCounters {
    pub fn guard_calls(&self) -> usize {
        self.guard.load(Ordering::SeqCst)
    }

    pub fn execute_calls(&self) -> usize {
        self.execute.load(Ordering::SeqCst)
    }
}

/// Action whose guard and body are closures. Succeeds with no data by default.
pub struct ScriptedAction {
    kind: String,
    priority: i64,
    dependencies: Vec<String>,
    guard: Guard,
    body: Body,
    counters: CallCounters,
}

impl ScriptedAction {
    pub fn new(kind: &str, priority: i64) -> Self {
        Self {
            kind: kind.to_string(),
            priority,
            dependencies: Vec::new(),
            guard: Box::new(|_| true),
            body: Box::new(|_| Ok(ActionOutput::default())),
            counters: CallCounters::default(),
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|dep| dep.to_string()).collect();
        self
    }

    pub fn with_guard(mut self, guard: impl Fn(&RunContext) -> bool + 'static) -> Self {
        self.guard = Box::new(guard);
        self
    }

    pub fn with_body(
        mut self,
        body: impl Fn(&mut RunContext) -> Result<ActionOutput> + 'static,
    ) -> Self {
        self.body = Box::new(body);
        self
    }

    /// Every attempt returns `Err(message)`.
    pub fn failing(self, message: &str) -> Self {
        let message = message.to_string();
        self.with_body(move |_| bail!("{message}"))
    }

    /// Every attempt panics with `message`.
    pub fn panicking(self, message: &'static str) -> Self {
        self.with_body(move |_| panic!("{message}"))
    }

    /// On success, record `path` as an added file.
    pub fn producing(self, path: &str) -> Self {
        let path = PathBuf::from(path);
        self.with_body(move |ctx| {
            ctx.add_file_change(FileChange::added(path.clone()));
            Ok(ActionOutput::default())
        })
    }

    pub fn counters(&self) -> CallCounters {
        self.counters.clone()
    }
}

impl Action for ScriptedAction {
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
        self.counters.guard.fetch_add(1, Ordering::SeqCst);
        (self.guard)(ctx)
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<ActionOutput> {
        self.counters.execute.fetch_add(1, Ordering::SeqCst);
        (self.body)(ctx)
    }
}

/// Advisor that replays queued replies and records every prompt it saw.
#[derive(Debug, Default)]
pub struct CannedAdvisor {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl CannedAdvisor {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A well-formed selection reply.
    pub fn choice(action: &str, confidence: f64) -> String {
        format!(
            "```json\n{{\"action\": \"{action}\", \"confidence\": {confidence}, \"reasoning\": \"picked {action}\"}}\n```"
        )
    }

    pub fn calls(&self) -> usize {
        self.prompts().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl Advisor for CannedAdvisor {
    fn generate(&self, prompt: &str, _system: Option<&str>) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| anyhow!("prompt log poisoned"))?
            .push(prompt.to_string());
        self.replies
            .lock()
            .map_err(|_| anyhow!("reply queue poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("no canned reply left"))
    }
}

/// Advisor that is always unavailable.
#[derive(Debug, Default)]
pub struct FailingAdvisor {
    calls: AtomicUsize,
}

impl FailingAdvisor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Advisor for FailingAdvisor {
    fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("advisor unavailable"))
    }
}

#[derive(Debug, Clone)]
enum ScriptedCommand {
    Output(CommandOutput),
    SpawnError(String),
}

/// Command runner serving in-memory files and scripted command results.
///
/// Commands are matched by their space-joined form. Unscripted commands exit 0
/// with no output. When several results are queued for one command they are
/// returned in order and the last one repeats.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    files: HashMap<PathBuf, String>,
    commands: Mutex<HashMap<String, VecDeque<ScriptedCommand>>>,
    invocations: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(PathBuf::from(path), contents.to_string());
        self
    }

    pub fn on(self, cmd: &[&str], output: CommandOutput) -> Self {
        self.push(cmd, ScriptedCommand::Output(output))
    }

    pub fn on_spawn_error(self, cmd: &[&str], message: &str) -> Self {
        self.push(cmd, ScriptedCommand::SpawnError(message.to_string()))
    }

    fn push(self, cmd: &[&str], scripted: ScriptedCommand) -> Self {
        if let Ok(mut commands) = self.commands.lock() {
            commands
                .entry(cmd.join(" "))
                .or_default()
                .push_back(scripted);
        }
        self
    }

    /// Commands run so far, space-joined, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations
            .lock()
            .map(|invocations| invocations.clone())
            .unwrap_or_default()
    }

    pub fn ran(&self, cmd: &[&str]) -> bool {
        self.invocations().contains(&cmd.join(" "))
    }
}

impl CommandRunner for ScriptedRunner {
    fn read_file(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file {}", path.display()))
    }

    fn run_command(&self, cmd: &[String], _timeout: Duration) -> Result<CommandOutput> {
        let key = display_command(cmd);
        self.invocations
            .lock()
            .map_err(|_| anyhow!("invocation log poisoned"))?
            .push(key.clone());
        let mut commands = self
            .commands
            .lock()
            .map_err(|_| anyhow!("command script poisoned"))?;
        let scripted = match commands.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match scripted {
            Some(ScriptedCommand::Output(output)) => Ok(output),
            Some(ScriptedCommand::SpawnError(message)) => Err(anyhow!("spawn {key}: {message}")),
            None => Ok(exited(0, "", "")),
        }
    }
}

/// Command argv from string slices.
pub fn cmd(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

/// A finished command with the given exit code and output.
pub fn exited(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        stdout_truncated: 0,
        stderr_truncated: 0,
        timed_out: false,
        duration_ms: 1,
    }
}

/// A command killed after exceeding its timeout.
pub fn timed_out() -> CommandOutput {
    CommandOutput {
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        stdout_truncated: 0,
        stderr_truncated: 0,
        timed_out: true,
        duration_ms: 1,
    }
}
