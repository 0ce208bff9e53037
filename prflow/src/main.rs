//! Pull-request automation runner.
//!
//! Runs config-declared actions (`.prflow/config.toml`), validates the files
//! they produce and gates publication on the validation score. The exit code
//! reports the publication decision.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use prflow::actions::registry_from_config;
use prflow::core::context::{RunContext, new_run_id};
use prflow::core::gate::{DEFAULT_CONFIDENCE_THRESHOLD, PublishDecision, decide};
use prflow::core::types::{FileChange, ValidationResult};
use prflow::exit_codes;
use prflow::io::advisor::CommandAdvisor;
use prflow::io::config::{PrflowConfig, load_config};
use prflow::io::init::{InitOptions, PrflowPaths, init_prflow};
use prflow::io::report::{RunReport, write_report};
use prflow::io::runner::{CommandRunner, SystemRunner};
use prflow::logging;
use prflow::pipeline::run_pipeline;
use prflow::scheduler::{RunOutcome, Scheduler, SchedulerConfig};
use prflow::validate::validate_changes;

#[derive(Parser)]
#[command(
    name = "prflow",
    version,
    about = "Schedule, validate and gate automated pull requests"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.prflow/` with a starter config.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the configured actions, validate their output and gate it.
    Run {
        /// Config file (default: `.prflow/config.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate the given files and gate them.
    Validate {
        /// Files to validate, relative to the current directory.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the publication decision for a score.
    Gate {
        #[arg(long)]
        score: f64,
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f64,
        /// Number of changed files.
        #[arg(long, default_value_t = 1)]
        changes: usize,
    },
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    run_id: &'a str,
    report: &'a Path,
    run: &'a RunOutcome,
    score: Option<f64>,
    decision: PublishDecision,
}

#[derive(Debug, Serialize)]
struct ValidateSummary<'a> {
    validation: &'a ValidationResult,
    decision: PublishDecision,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Run { config } => cmd_run(&root, config),
        Command::Validate { files, config } => cmd_validate(&root, files, config),
        Command::Gate {
            score,
            threshold,
            changes,
        } => cmd_gate(score, threshold, changes),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_prflow(root, &InitOptions { force })?;
    println!("{}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, config: Option<PathBuf>) -> Result<i32> {
    let paths = PrflowPaths::new(root);
    let cfg = load(&paths, config)?;

    let runner = Arc::new(SystemRunner::new(root, cfg.validation.output_limit_bytes));
    let registry = registry_from_config(&cfg, runner.clone() as Arc<dyn CommandRunner>)?;
    let advisor = cfg.advisor.command.as_ref().map(|command| CommandAdvisor {
        command: command.clone(),
        workdir: root.to_path_buf(),
        timeout: Duration::from_secs(cfg.advisor.timeout_secs),
        output_limit_bytes: cfg.advisor.output_limit_bytes,
    });
    let mut scheduler = Scheduler::new(&registry, SchedulerConfig::from_config(&cfg));
    if let Some(advisor) = &advisor {
        scheduler = scheduler.with_advisor(advisor);
    }

    let mut ctx = RunContext::new(new_run_id(Utc::now()));
    info!(run_id = ctx.run_id(), actions = registry.len(), "starting run");
    let outcome = run_pipeline(
        &scheduler,
        runner.as_ref(),
        &cfg.validation,
        cfg.confidence_threshold,
        &mut ctx,
    )?;

    let report_path = paths.report_path(ctx.run_id());
    write_report(&report_path, &RunReport::new(&ctx, &outcome, Utc::now()))?;
    print_json(&RunSummary {
        run_id: ctx.run_id(),
        report: &report_path,
        run: &outcome.run,
        score: outcome.validation.as_ref().map(|v| v.score),
        decision: outcome.decision,
    })?;
    Ok(exit_codes::for_decision(outcome.decision))
}

fn cmd_validate(root: &Path, files: Vec<PathBuf>, config: Option<PathBuf>) -> Result<i32> {
    let cfg = load(&PrflowPaths::new(root), config)?;
    let runner = SystemRunner::new(root, cfg.validation.output_limit_bytes);
    let changes: Vec<FileChange> = files.into_iter().map(FileChange::modified).collect();

    let validation = validate_changes(&runner, &cfg.validation, &changes);
    let decision = decide(validation.score, cfg.confidence_threshold, changes.len());
    print_json(&ValidateSummary {
        validation: &validation,
        decision,
    })?;
    Ok(exit_codes::for_decision(decision))
}

fn cmd_gate(score: f64, threshold: f64, changes: usize) -> Result<i32> {
    if !(0.0..=1.0).contains(&score) {
        bail!("--score must be within [0, 1]");
    }
    if !(0.0..=1.0).contains(&threshold) {
        bail!("--threshold must be within [0, 1]");
    }
    let decision = decide(score, threshold, changes);
    println!("{decision}");
    Ok(exit_codes::for_decision(decision))
}

fn load(paths: &PrflowPaths, config: Option<PathBuf>) -> Result<PrflowConfig> {
    let path = config.unwrap_or_else(|| paths.config_path.clone());
    load_config(&path)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
