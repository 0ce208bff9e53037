//! Initialization helpers for `.prflow/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// All canonical paths within `.prflow/` for a project root.
#[derive(Debug, Clone)]
pub struct PrflowPaths {
    pub root: PathBuf,
    pub prflow_dir: PathBuf,
    pub config_path: PathBuf,
    pub reports_dir: PathBuf,
    pub gitignore_path: PathBuf,
}

impl PrflowPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let prflow_dir = root.join(".prflow");
        Self {
            root: root.clone(),
            prflow_dir: prflow_dir.clone(),
            config_path: prflow_dir.join("config.toml"),
            reports_dir: prflow_dir.join("reports"),
            gitignore_path: prflow_dir.join(".gitignore"),
        }
    }

    /// Where the report for `run_id` is written.
    pub fn report_path(&self, run_id: &str) -> PathBuf {
        self.reports_dir.join(format!("{run_id}.json"))
    }
}

/// Options for `init_prflow`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing prflow-owned files.
    pub force: bool,
}

/// Create `.prflow/` scaffolding in `root`.
///
/// Fails if `.prflow/` already exists unless `options.force` is set.
pub fn init_prflow(root: &Path, options: &InitOptions) -> Result<PrflowPaths> {
    let paths = PrflowPaths::new(root);
    if paths.prflow_dir.exists() && !paths.prflow_dir.is_dir() {
        return Err(anyhow!("prflow init: .prflow exists but is not a directory"));
    }
    if paths.prflow_dir.exists() && !options.force {
        return Err(anyhow!(
            "prflow init: .prflow already exists (use --force to overwrite)"
        ));
    }

    create_dir(&paths.prflow_dir)?;
    create_dir(&paths.reports_dir)?;
    write_file(&paths.gitignore_path, PRFLOW_GITIGNORE)?;
    write_file(&paths.config_path, CONFIG_TEMPLATE)?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const PRFLOW_GITIGNORE: &str = "reports/\n";

const CONFIG_TEMPLATE: &str = r#"# prflow configuration.

max_iterations = 10
confidence_threshold = 0.7

# Kinds whose success ends the run early.
terminal_actions = []

[validation]
# build = ["npm", "run", "build"]
# lint = ["npx", "eslint", "--format", "unix", "."]
# test = ["npm", "test"]
command_timeout_secs = 300
output_limit_bytes = 100000

[advisor]
# Reads the selection prompt on stdin, answers with JSON on stdout.
# command = ["./scripts/advisor.sh"]
timeout_secs = 120
output_limit_bytes = 100000

# [[actions]]
# kind = "analyze"
# priority = 100
# command = ["./scripts/analyze.sh"]
#
# [[actions]]
# kind = "generate"
# priority = 50
# depends_on = ["analyze"]
# command = ["./scripts/generate.sh"]
# produces = ["src/App.tsx"]
"#;
