//! CommandExec - bounded external command execution for probes
//!
//! - Runs a program directly (no shell) with a hard deadline
//! - Captures exit code, stdout, stderr and duration
//! - Kills the child when the deadline passes
//! - Maps every outcome onto a `ProbeFailure` so callers can use `?`

use crate::probe::ProbeFailure;
use serde::Serialize;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::runtime::{Builder, Handle};
use tracing::{debug, warn};

/// Maximum output length to capture
const MAX_OUTPUT_BYTES: usize = 64 * 1024; // 64KB

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    /// Exit code 0
    Success,
    NonZeroExit,
    CommandNotFound,
    PermissionDenied,
    /// Killed after the deadline
    Timeout,
    OsError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::CommandNotFound => "command not found",
            Self::PermissionDenied => "permission denied",
            Self::Timeout => "timeout",
            Self::OsError => "OS error",
        }
    }
}

/// Result of a command execution
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub full_command: String,
    /// -1 when the process never produced an exit code
    pub exit_code: i32,
    pub stdout: String,
    pub stdout_truncated: bool,
    pub stderr: String,
    pub duration_ms: u64,
    pub status: ExecutionStatus,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Stdout on success, otherwise the matching probe failure
    pub fn into_stdout(self) -> Result<String, ProbeFailure> {
        match self.status {
            ExecutionStatus::Success => Ok(self.stdout),
            ExecutionStatus::CommandNotFound => Err(ProbeFailure::missing(format!(
                "{} not found",
                self.full_command.split_whitespace().next().unwrap_or("command")
            ))),
            ExecutionStatus::Timeout => Err(ProbeFailure::runtime(format!(
                "{} timed out after {}ms",
                self.full_command, self.duration_ms
            ))),
            ExecutionStatus::NonZeroExit => {
                let first = self.stderr.lines().next().unwrap_or("").trim();
                Err(ProbeFailure::runtime(if first.is_empty() {
                    format!("{} exited with {}", self.full_command, self.exit_code)
                } else {
                    format!("{} exited with {}: {}", self.full_command, self.exit_code, first)
                }))
            }
            ExecutionStatus::PermissionDenied | ExecutionStatus::OsError => Err(
                ProbeFailure::runtime(format!("{}: {}", self.full_command, self.stderr)),
            ),
        }
    }
}

/// Command executor with a per-command deadline
#[derive(Debug, Clone, Copy)]
pub struct CommandExec {
    timeout: Duration,
}

impl CommandExec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run and return stdout, or a failure describing what went wrong
    pub fn stdout(&self, program: &str, args: &[&str]) -> Result<String, ProbeFailure> {
        self.execute(program, args).into_stdout()
    }

    /// Blocking entry point. On a runtime's blocking threads it borrows the
    /// current handle; elsewhere it builds a private single-threaded
    /// runtime. Must not be called from an async task.
    pub fn execute(&self, program: &str, args: &[&str]) -> CommandResult {
        let fut = self.run(program, args);
        match Handle::try_current() {
            Ok(handle) => handle.block_on(fut),
            Err(_) => match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt.block_on(fut),
                Err(e) => spawn_failure(full_command(program, args), &e, Instant::now()),
            },
        }
    }

    /// Spawn, wait under the deadline, collect. The child is killed when
    /// the deadline drops the wait future.
    pub async fn run(&self, program: &str, args: &[&str]) -> CommandResult {
        let start = Instant::now();
        let full_command = full_command(program, args);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return spawn_failure(full_command, &e, start),
        };

        let waited = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match waited {
            Ok(Ok(output)) => {
                let (stdout, stdout_truncated) = truncate_output(&output.stdout);
                let (stderr, _) = truncate_output(&output.stderr);
                let status = if output.status.success() {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::NonZeroExit
                };
                CommandResult {
                    full_command,
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout,
                    stdout_truncated,
                    stderr,
                    duration_ms,
                    status,
                }
            }
            Ok(Err(e)) => {
                debug!("wait on {} failed: {}", full_command, e);
                CommandResult {
                    stderr: format!("OS error: {}", e),
                    ..empty_result(full_command, duration_ms, ExecutionStatus::OsError)
                }
            }
            Err(_) => {
                warn!("{} killed after {}ms", full_command, self.timeout.as_millis());
                empty_result(full_command, duration_ms, ExecutionStatus::Timeout)
            }
        };

        debug!("{} -> {} in {}ms", result.full_command, result.status.as_str(), duration_ms);
        result
    }
}

fn full_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

fn empty_result(full_command: String, duration_ms: u64, status: ExecutionStatus) -> CommandResult {
    CommandResult {
        full_command,
        exit_code: -1,
        stdout: String::new(),
        stdout_truncated: false,
        stderr: String::new(),
        duration_ms,
        status,
    }
}

fn spawn_failure(full_command: String, e: &std::io::Error, start: Instant) -> CommandResult {
    let status = match e.kind() {
        std::io::ErrorKind::NotFound => ExecutionStatus::CommandNotFound,
        std::io::ErrorKind::PermissionDenied => ExecutionStatus::PermissionDenied,
        _ => ExecutionStatus::OsError,
    };
    CommandResult {
        stderr: format!("OS error: {}", e),
        ..empty_result(full_command, start.elapsed().as_millis() as u64, status)
    }
}

/// Truncate output to max bytes, returning (string, was_truncated)
fn truncate_output(bytes: &[u8]) -> (String, bool) {
    if bytes.len() > MAX_OUTPUT_BYTES {
        let truncated = &bytes[..MAX_OUTPUT_BYTES];
        (String::from_utf8_lossy(truncated).to_string(), true)
    } else {
        (String::from_utf8_lossy(bytes).to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FailureReason;

    #[test]
    fn test_truncate_output() {
        let short = b"hello";
        let (s, truncated) = truncate_output(short);
        assert_eq!(s, "hello");
        assert!(!truncated);

        let long = vec![b'x'; MAX_OUTPUT_BYTES + 100];
        let (s, truncated) = truncate_output(&long);
        assert_eq!(s.len(), MAX_OUTPUT_BYTES);
        assert!(truncated);
    }

    #[test]
    fn test_missing_program_is_missing_dependency() {
        let exec = CommandExec::from_millis(1_000);
        let err = exec.stdout("sysscope-no-such-tool", &[]).unwrap_err();
        assert_eq!(err.reason, FailureReason::MissingDependency);
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let exec = CommandExec::from_millis(2_000);
        let out = exec.stdout("echo", &["sysscope-ok"]).unwrap();
        assert_eq!(out.trim(), "sysscope-ok");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_runtime_error() {
        let exec = CommandExec::from_millis(2_000);
        let result = exec.execute("false", &[]);
        assert_eq!(result.status, ExecutionStatus::NonZeroExit);
        assert_eq!(result.into_stdout().unwrap_err().reason, FailureReason::RuntimeError);
    }

    #[cfg(unix)]
    #[test]
    fn test_deadline_kills_child() {
        let exec = CommandExec::from_millis(100);
        let start = Instant::now();
        let result = exec.execute("sleep", &["5"]);
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deadline_inside_blocking_pool() {
        let exec = CommandExec::from_millis(100);
        let start = Instant::now();
        let result = tokio::task::spawn_blocking(move || exec.execute("sleep", &["5"]))
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_async_run_captures_stdout() {
        let exec = CommandExec::from_millis(2_000);
        let result = exec.run("echo", &["from-async"]).await;
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "from-async");
    }
}
