//! Helpers for running child processes with timeouts and bounded output.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal (including on timeout).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Last `max_lines` non-empty lines of stderr, falling back to stdout.
    pub fn tail(&self, max_lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Run `cmd` (program + args) in `workdir` with a timeout, capturing output
/// without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr kept in memory; bytes beyond it are discarded while still draining the pipe.
/// A timeout kills the child and is reported through `timed_out`, not as an error.
#[instrument(skip_all, fields(program = cmd.first().map(String::as_str), timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    cmd: &[String],
    workdir: &Path,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("command must be non-empty");
    };
    let mut command = Command::new(program);
    command.args(args).current_dir(workdir);
    if stdin.is_some() {
        command.stdin(Stdio::piped());
    } else {
        command.stdin(Stdio::null());
    }
    command.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let start = Instant::now();
    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {program}"));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    // Fed from its own thread so the timeout applies even if the child never reads stdin.
    let stdin_handle = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let input = input.to_vec();
            Some(thread::spawn(move || {
                // Dropping the handle closes the pipe so the child sees EOF.
                if let Err(e) = child_stdin.write_all(&input) {
                    debug!(err = %e, "stdin not fully written");
                }
            }))
        }
        None => None,
    };

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    if let Some(handle) = stdin_handle
        && handle.join().is_err()
    {
        warn!("stdin writer thread panicked");
    }
    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        exit_code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        stdout_truncated,
        stderr_truncated,
        timed_out,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Render a command for logs and issue messages.
pub fn display_command(cmd: &[String]) -> String {
    cmd.join(" ")
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn captures_exit_code_and_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_command_with_timeout(
            &sh("echo out; echo err >&2; exit 3"),
            temp.path(),
            None,
            Duration::from_secs(5),
            1024,
        )
        .expect("run");
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[test]
    fn feeds_stdin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_command_with_timeout(
            &sh("cat"),
            temp.path(),
            Some(b"hello"),
            Duration::from_secs(5),
            1024,
        )
        .expect("run");
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn kills_on_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_command_with_timeout(
            &sh("sleep 5"),
            temp.path(),
            None,
            Duration::from_millis(200),
            1024,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn timeout_holds_when_child_ignores_large_stdin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = vec![b'x'; 1 << 20];
        let start = Instant::now();
        let output = run_command_with_timeout(
            &["sleep".to_string(), "5".to_string()],
            temp.path(),
            Some(&input),
            Duration::from_millis(200),
            1024,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn truncates_output_beyond_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_command_with_timeout(
            &sh("printf 'abcdef'"),
            temp.path(),
            None,
            Duration::from_secs(5),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout, "abcd");
        assert_eq!(output.stdout_truncated, 2);
    }

    #[test]
    fn missing_program_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = run_command_with_timeout(
            &["definitely-not-a-real-binary-xyz".to_string()],
            temp.path(),
            None,
            Duration::from_secs(1),
            16,
        )
        .expect_err("spawn should fail");
        assert!(err.to_string().contains("spawn"));
    }

    #[test]
    fn tail_prefers_stderr() {
        let output = CommandOutput {
            exit_code: Some(1),
            stdout: "a\nb\n".to_string(),
            stderr: "x\n\ny\nz\n".to_string(),
            stdout_truncated: 0,
            stderr_truncated: 0,
            timed_out: false,
            duration_ms: 0,
        };
        assert_eq!(output.tail(2), "y\nz");
    }
}
