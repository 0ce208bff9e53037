//! Reasoning advisor abstraction.
//!
//! The scheduler only consults an [`Advisor`] to break ties between several
//! ready actions. Any failure here degrades to deterministic selection, so
//! implementations are free to return errors liberally.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::io::process::{display_command, run_command_with_timeout};

/// Fallible text-in, text-out oracle.
pub trait Advisor: Send + Sync {
    fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String>;
}

/// Advisor that pipes the prompt to an external command and returns its stdout.
///
/// When a system message is given it is prepended to the prompt, separated by
/// a blank line.
#[derive(Debug, Clone)]
pub struct CommandAdvisor {
    pub command: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Advisor for CommandAdvisor {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs()))]
    fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        info!(command = %display_command(&self.command), "consulting advisor");
        let input = match system {
            Some(system) => format!("{}\n\n{}", system.trim(), prompt),
            None => prompt.to_string(),
        };
        let output = run_command_with_timeout(
            &self.command,
            &self.workdir,
            Some(input.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "advisor timed out");
            return Err(anyhow!("advisor timed out after {:?}", self.timeout));
        }
        if !output.success() {
            warn!(exit_code = ?output.exit_code, "advisor failed");
            bail!(
                "advisor exited with status {:?}: {}",
                output.exit_code,
                output.tail(5)
            );
        }
        debug!(bytes = output.stdout.len(), "advisor replied");
        Ok(output.stdout)
    }
}
