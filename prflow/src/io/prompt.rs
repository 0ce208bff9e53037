//! Selection prompt rendering for the reasoning advisor.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::action::Action;
use crate::core::context::RunContext;

const SELECT_ACTION_TEMPLATE: &str = include_str!("prompts/select_action.md");

/// JSON Schema the advisor's selection reply must satisfy.
pub const SELECTION_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/action_selection/v1.schema.json"
));

/// System message sent with every selection prompt.
pub const SELECTION_SYSTEM: &str = "You schedule steps of an automated pull-request pipeline. \
     Answer with JSON only.";

#[derive(Debug, Serialize)]
struct ReadyEntry<'a> {
    kind: &'a str,
    priority: i64,
    dependencies: &'a [String],
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    kind: &'a str,
    outcome: String,
}

/// Render the prompt asking the advisor to choose among `ready`.
pub fn render_selection_prompt(ready: &[&dyn Action], ctx: &RunContext) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("select_action", SELECT_ACTION_TEMPLATE)?;

    let ready: Vec<ReadyEntry<'_>> = ready
        .iter()
        .map(|action| ReadyEntry {
            kind: action.kind(),
            priority: action.priority(),
            dependencies: action.dependencies(),
        })
        .collect();
    let history: Vec<HistoryEntry<'_>> = ctx
        .history()
        .iter()
        .map(|result| HistoryEntry {
            kind: &result.action_type,
            outcome: if result.success {
                "succeeded".to_string()
            } else {
                format!(
                    "failed ({})",
                    result.error.as_deref().unwrap_or("unknown error")
                )
            },
        })
        .collect();
    let decisions: Vec<&str> = ctx.decisions().keys().map(String::as_str).collect();

    let rendered = env.get_template("select_action")?.render(context! {
        run_id => ctx.run_id(),
        ready => ready,
        history => history,
        decisions => decisions,
    })?;
    debug!(bytes = rendered.len(), "rendered selection prompt");
    Ok(rendered)
}
