//! tools::exec
//!
//! Bounded subprocess invocation.
//!
//! # Design
//!
//! Every external tool call in this crate (docker, kind, helm, kubectl)
//! flows through these helpers, which enforce an explicit timeout on each
//! invocation: a wedged tool surfaces as a typed [`ExecError::TimedOut`]
//! instead of hanging the CLI.
//!
//! Two modes mirror how the tools are used:
//! - [`run_capture`]: stdout/stderr captured, for probes whose output the
//!   caller parses (`kind get clusters`, `helm list -o json`).
//! - [`run_streamed`]: stdio inherited, for long operations whose progress
//!   the developer should see live (`kind create cluster`,
//!   `helm upgrade --wait`).

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Errors from subprocess invocation.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program is not installed or not on PATH.
    #[error("`{program}` not found on PATH")]
    NotFound { program: String },

    /// The invocation exceeded its timeout and was killed.
    #[error("`{command}` timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },

    /// Spawning or waiting on the process failed.
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        source: std::io::Error,
    },
}

/// Result of a completed (non-timed-out) invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured stdout (empty in streamed mode).
    pub stdout: String,
    /// Captured stderr (empty in streamed mode).
    pub stderr: String,
}

impl ExecOutput {
    /// Whether the process exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// A short diagnostic suitable for embedding in error messages:
    /// stderr if present, else stdout, trimmed.
    pub fn diagnostic(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        text.to_string()
    }
}

/// Render a command line for error messages.
pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Run a command, capturing stdout and stderr, bounded by `timeout`.
pub async fn run_capture(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<ExecOutput, ExecError> {
    let command = command_line(program, args);

    let future = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, future).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExecError::NotFound {
                program: program.to_string(),
            })
        }
        Ok(Err(e)) => return Err(ExecError::Io { command, source: e }),
        Err(_) => {
            return Err(ExecError::TimedOut {
                command,
                timeout_secs: timeout.as_secs(),
            })
        }
    };

    Ok(ExecOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command with inherited stdio, bounded by `timeout`.
///
/// The child is killed if the timeout elapses.
pub async fn run_streamed(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<ExecOutput, ExecError> {
    let command = command_line(program, args);

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExecError::NotFound {
                program: program.to_string(),
            })
        }
        Err(e) => return Err(ExecError::Io { command, source: e }),
    };

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(ExecError::Io { command, source: e }),
        Err(_) => {
            let _ = child.start_kill();
            return Err(ExecError::TimedOut {
                command,
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    Ok(ExecOutput {
        exit_code: status.code(),
        stdout: String::new(),
        stderr: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn capture_collects_stdout() {
        let out = run_capture("echo", &["hello"], SHORT).await.expect("run");
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn capture_reports_nonzero_exit() {
        let out = run_capture("false", &[], SHORT).await.expect("run");
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(1));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let err = run_capture("airlocal-no-such-tool", &[], SHORT)
            .await
            .expect_err("not found");
        assert!(matches!(err, ExecError::NotFound { .. }));
    }

    #[tokio::test]
    async fn timeout_kills_and_reports() {
        let err = run_capture("sleep", &["30"], Duration::from_millis(100))
            .await
            .expect_err("timeout");
        match err {
            ExecError::TimedOut { command, .. } => assert!(command.contains("sleep")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn streamed_reports_exit_code() {
        let out = run_streamed("true", &[], SHORT).await.expect("run");
        assert!(out.success());
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn diagnostic_prefers_stderr() {
        let out = ExecOutput {
            exit_code: Some(1),
            stdout: "ignored".into(),
            stderr: "  real problem \n".into(),
        };
        assert_eq!(out.diagnostic(), "real problem");

        let out = ExecOutput {
            exit_code: Some(1),
            stdout: "fallback".into(),
            stderr: String::new(),
        };
        assert_eq!(out.diagnostic(), "fallback");
    }

    #[test]
    fn command_line_rendering() {
        assert_eq!(
            command_line("kind", &["get", "clusters"]),
            "kind get clusters"
        );
    }
}
