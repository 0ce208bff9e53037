//! File and command access for actions and the validator.
//!
//! The [`CommandRunner`] trait decouples validation from the host system.
//! Tests use a scripted runner that serves canned files and command outputs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Reads files and runs commands relative to some project root.
pub trait CommandRunner: Send + Sync {
    fn read_file(&self, path: &Path) -> Result<String>;

    /// Run `cmd` to completion or until `timeout` elapses.
    ///
    /// Timeouts are reported through [`CommandOutput::timed_out`]; `Err` means
    /// the command could not be started at all.
    fn run_command(&self, cmd: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// Runner backed by the local filesystem and real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    workdir: PathBuf,
    output_limit_bytes: usize,
}

impl SystemRunner {
    pub fn new(workdir: impl Into<PathBuf>, output_limit_bytes: usize) -> Self {
        Self {
            workdir: workdir.into(),
            output_limit_bytes,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn read_file(&self, path: &Path) -> Result<String> {
        let full = self.workdir.join(path);
        fs::read_to_string(&full).with_context(|| format!("read {}", full.display()))
    }

    fn run_command(&self, cmd: &[String], timeout: Duration) -> Result<CommandOutput> {
        debug!(workdir = %self.workdir.display(), "running command");
        run_command_with_timeout(cmd, &self.workdir, None, timeout, self.output_limit_bytes)
    }
}
