//! Scheduler behaviour over scripted actions and advisors.
//!
//! Each test builds a small registry of [`ScriptedAction`]s, runs the loop
//! once and inspects the resulting history, decisions and call counters.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use prflow::core::action::ActionOutput;
use prflow::core::context::RunContext;
use prflow::core::registry::ActionRegistry;
use prflow::core::types::Phase;
use prflow::scheduler::{RunOutcome, Scheduler, SchedulerConfig, StopReason};
use prflow::test_support::{CannedAdvisor, FailingAdvisor, ScriptedAction};
use serde_json::json;

fn registry(actions: Vec<ScriptedAction>) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    for action in actions {
        registry.register(action).expect("register");
    }
    registry
}

fn order(ctx: &RunContext) -> Vec<&str> {
    ctx.history()
        .iter()
        .map(|result| result.action_type.as_str())
        .collect()
}

fn run(registry: &ActionRegistry, config: SchedulerConfig) -> (RunContext, RunOutcome) {
    let mut ctx = RunContext::new("run-test");
    let outcome = Scheduler::new(registry, config)
        .run(&mut ctx)
        .expect("run");
    (ctx, outcome)
}

/// `a` needs `b`, `b` needs `c`: only one action is ever ready, so the
/// dependency chain alone dictates the order and the advisor is never asked.
#[test]
fn dependencies_gate_execution_order() {
    let registry = registry(vec![
        ScriptedAction::new("a", 100).depends_on(&["b"]),
        ScriptedAction::new("b", 90).depends_on(&["c"]),
        ScriptedAction::new("c", 10),
    ]);
    let advisor = CannedAdvisor::new(Vec::<String>::new());
    let mut ctx = RunContext::new("run-test");

    let outcome = Scheduler::new(&registry, SchedulerConfig::default())
        .with_advisor(&advisor)
        .run(&mut ctx)
        .expect("run");

    assert_eq!(order(&ctx), vec!["c", "b", "a"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(advisor.calls(), 0);
}

#[test]
fn without_advisor_priority_order_is_deterministic() {
    for _ in 0..5 {
        let registry = registry(vec![
            ScriptedAction::new("low", 80),
            ScriptedAction::new("high", 100),
            ScriptedAction::new("mid", 90),
        ]);
        let (ctx, outcome) = run(&registry, SchedulerConfig::default());
        assert_eq!(order(&ctx), vec!["high", "mid", "low"]);
        assert_eq!(outcome.succeeded, vec!["high", "mid", "low"]);
    }
}

#[test]
fn equal_priorities_run_in_registration_order() {
    let registry = registry(vec![
        ScriptedAction::new("first", 5),
        ScriptedAction::new("second", 5),
    ]);
    let (ctx, _) = run(&registry, SchedulerConfig::default());
    assert_eq!(order(&ctx), vec!["first", "second"]);
}

#[test]
fn failing_advisor_falls_back_to_priority() {
    let registry = registry(vec![
        ScriptedAction::new("low", 80),
        ScriptedAction::new("high", 100),
        ScriptedAction::new("mid", 90),
    ]);
    let advisor = FailingAdvisor::default();
    let mut ctx = RunContext::new("run-test");

    Scheduler::new(&registry, SchedulerConfig::default())
        .with_advisor(&advisor)
        .run(&mut ctx)
        .expect("run");

    assert_eq!(order(&ctx), vec!["high", "mid", "low"]);
    // Consulted only while more than one action was ready.
    assert_eq!(advisor.calls(), 2);
}

#[test]
fn advisor_choice_is_honoured_and_reasoning_recorded() {
    let registry = registry(vec![
        ScriptedAction::new("a", 100),
        ScriptedAction::new("b", 10),
    ]);
    let advisor = CannedAdvisor::new([CannedAdvisor::choice("b", 0.9)]);
    let mut ctx = RunContext::new("run-test");

    Scheduler::new(&registry, SchedulerConfig::default())
        .with_advisor(&advisor)
        .run(&mut ctx)
        .expect("run");

    assert_eq!(order(&ctx), vec!["b", "a"]);
    assert_eq!(advisor.calls(), 1);
    assert_eq!(ctx.history()[0].reasoning.as_deref(), Some("picked b"));
    assert_eq!(ctx.history()[1].reasoning, None);

    let prompt = &advisor.prompts()[0];
    assert!(prompt.contains("`a` (priority 100)"));
    assert!(prompt.contains("`b` (priority 10)"));
}

#[test]
fn unusable_advisor_replies_fall_back_to_priority() {
    let replies = [
        CannedAdvisor::choice("ghost", 0.9),
        "I would run b next.".to_string(),
        "{\"action\": \"b\", \"confidence\": 3.0, \"reasoning\": \"sure\"}".to_string(),
    ];
    for reply in replies {
        let registry = registry(vec![
            ScriptedAction::new("a", 100),
            ScriptedAction::new("b", 10),
        ]);
        let advisor = CannedAdvisor::new([reply.clone()]);
        let mut ctx = RunContext::new("run-test");

        Scheduler::new(&registry, SchedulerConfig::default())
            .with_advisor(&advisor)
            .run(&mut ctx)
            .expect("run");

        assert_eq!(order(&ctx), vec!["a", "b"], "reply: {reply}");
    }
}

/// `b` is ready only while the flag is set; `a` depends on `b`.
#[test]
fn closed_guard_blocks_dependents_until_it_opens() {
    let open = Rc::new(Cell::new(false));
    let flag = Rc::clone(&open);
    let registry = registry(vec![
        ScriptedAction::new("a", 100).depends_on(&["b"]),
        ScriptedAction::new("b", 10).with_guard(move |_| flag.get()),
    ]);

    let (closed, outcome) = run(&registry, SchedulerConfig::default());
    assert!(closed.history().is_empty());
    assert_eq!(closed.attempts("a"), 0);
    assert_eq!(outcome.stop, StopReason::Exhausted);

    open.set(true);
    let (opened, outcome) = run(&registry, SchedulerConfig::default());
    assert_eq!(order(&opened), vec!["b", "a"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
}

#[test]
fn guard_opened_by_a_decision_unblocks_dependents() {
    let registry = registry(vec![
        ScriptedAction::new("a", 100).depends_on(&["b"]),
        ScriptedAction::new("b", 90).with_guard(|ctx| ctx.decision("unlock") == Some(&json!(true))),
        ScriptedAction::new("unlock", 10).with_body(|_| Ok(ActionOutput::with_data(json!(true)))),
    ]);

    let (ctx, _) = run(&registry, SchedulerConfig::default());

    assert_eq!(order(&ctx), vec!["unlock", "b", "a"]);
}

/// An action that always fails never unblocks its dependents and never
/// starves independent work; the run still completes normally.
#[test]
fn failures_are_contained() {
    let registry = registry(vec![
        ScriptedAction::new("analyze", 100).failing("analysis service down"),
        ScriptedAction::new("generate", 90).depends_on(&["analyze"]),
        ScriptedAction::new("docs", 50),
    ]);
    let (ctx, outcome) = run(&registry, SchedulerConfig::default());

    assert_eq!(&order(&ctx)[..2], &["analyze", "docs"]);
    assert!(ctx.has_succeeded("docs"));
    assert_eq!(ctx.attempts("generate"), 0);
    assert_eq!(outcome.succeeded, vec!["docs"]);
    assert_eq!(outcome.failed, vec!["analyze"]);
    assert_eq!(outcome.stop, StopReason::IterationCap);
    assert_eq!(ctx.phase(), Phase::Completed);

    let failure = &ctx.history()[0];
    assert!(!failure.success);
    assert_eq!(failure.error.as_deref(), Some("analysis service down"));
}

#[test]
fn panicking_action_is_recorded_as_failure() {
    let registry = registry(vec![
        ScriptedAction::new("explode", 100).panicking("kaboom"),
        ScriptedAction::new("after", 10),
    ]);
    let config = SchedulerConfig {
        max_iterations: 3,
        ..SchedulerConfig::default()
    };
    let (ctx, outcome) = run(&registry, config);

    assert_eq!(order(&ctx), vec!["explode", "after", "explode"]);
    assert_eq!(
        ctx.history()[0].error.as_deref(),
        Some("action panicked: kaboom")
    );
    assert_eq!(outcome.succeeded, vec!["after"]);
}

#[test]
fn panicking_guard_keeps_action_out_of_ready_set() {
    let registry = registry(vec![
        ScriptedAction::new("broken", 100).with_guard(|_| panic!("guard bug")),
        ScriptedAction::new("fine", 10),
    ]);
    let (ctx, outcome) = run(&registry, SchedulerConfig::default());

    assert_eq!(order(&ctx), vec!["fine"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
}

#[test]
fn succeeded_actions_are_never_revisited() {
    let first = ScriptedAction::new("first", 100);
    let second = ScriptedAction::new("second", 50);
    let third = ScriptedAction::new("third", 10).depends_on(&["second"]);
    let counters = first.counters();
    let registry = registry(vec![first, second, third]);

    let (ctx, _) = run(&registry, SchedulerConfig::default());

    assert_eq!(ctx.history().len(), 3);
    assert_eq!(counters.execute_calls(), 1);
    assert_eq!(counters.guard_calls(), 1);
}

#[test]
fn iteration_cap_stops_retrying_without_error() {
    let flaky = ScriptedAction::new("flaky", 1).failing("still broken");
    let counters = flaky.counters();
    let registry = registry(vec![flaky]);
    let config = SchedulerConfig {
        max_iterations: 3,
        ..SchedulerConfig::default()
    };

    let (ctx, outcome) = run(&registry, config);

    assert_eq!(outcome.stop, StopReason::IterationCap);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(counters.execute_calls(), 3);
    assert_eq!(ctx.attempts("flaky"), 3);
    assert_eq!(ctx.phase(), Phase::Completed);
    assert_eq!(ctx.metadata().error, None);
}

#[test]
fn terminal_actions_end_the_run() {
    let registry = registry(vec![
        ScriptedAction::new("a", 100),
        ScriptedAction::new("b", 90),
        ScriptedAction::new("c", 80),
    ]);
    let config = SchedulerConfig {
        terminal_actions: BTreeSet::from(["b".to_string()]),
        ..SchedulerConfig::default()
    };

    let (ctx, outcome) = run(&registry, config);

    assert_eq!(order(&ctx), vec!["a", "b"]);
    assert_eq!(outcome.stop, StopReason::TerminalReached);
    assert_eq!(ctx.progress(), 100);
    assert_eq!(ctx.phase(), Phase::Completed);
}

#[test]
fn progress_is_measured_over_terminal_actions() {
    let snapshot = |ctx: &mut RunContext| -> anyhow::Result<ActionOutput> {
        Ok(ActionOutput::with_data(json!({
            "phase": ctx.phase().as_str(),
            "progress": ctx.progress(),
        })))
    };
    let registry = registry(vec![
        ScriptedAction::new("a", 100).with_body(snapshot),
        ScriptedAction::new("setup", 95).with_body(snapshot),
        ScriptedAction::new("b", 90).with_body(snapshot),
    ]);
    let config = SchedulerConfig {
        terminal_actions: BTreeSet::from(["a".to_string(), "b".to_string()]),
        ..SchedulerConfig::default()
    };

    let (ctx, _) = run(&registry, config);

    assert_eq!(
        ctx.decision("a"),
        Some(&json!({"phase": "analyzing", "progress": 0}))
    );
    assert_eq!(
        ctx.decision("setup"),
        Some(&json!({"phase": "planning", "progress": 50}))
    );
    assert_eq!(
        ctx.decision("b"),
        Some(&json!({"phase": "planning", "progress": 50}))
    );
    assert_eq!(ctx.progress(), 100);
}

#[test]
fn decisions_drive_guards_of_later_actions() {
    let registry = registry(vec![
        ScriptedAction::new("detect", 100)
            .with_body(|_| Ok(ActionOutput::with_data(json!({"framework": "react"})))),
        ScriptedAction::new("vue-only", 90).with_guard(|ctx| {
            ctx.decision("detect")
                .is_some_and(|d| d["framework"] == "vue")
        }),
        ScriptedAction::new("react-only", 80).with_guard(|ctx| {
            ctx.decision("detect")
                .is_some_and(|d| d["framework"] == "react")
        }),
    ]);

    let (ctx, outcome) = run(&registry, SchedulerConfig::default());

    assert_eq!(order(&ctx), vec!["detect", "react-only"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
}

#[test]
fn produced_files_accumulate_in_context() {
    let registry = registry(vec![
        ScriptedAction::new("header", 100).producing("src/Header.tsx"),
        ScriptedAction::new("footer", 90).producing("src/Footer.tsx"),
    ]);
    let (ctx, _) = run(&registry, SchedulerConfig::default());

    let paths: Vec<String> = ctx
        .file_changes()
        .iter()
        .map(|change| change.path.display().to_string())
        .collect();
    assert_eq!(paths, vec!["src/Header.tsx", "src/Footer.tsx"]);
}
