//! Process execution for code segments.
//!
//! Two entry points share one capture path:
//! - [`CommandGateway`] runs allow-listed shell command lines.
//! - [`ScriptRunner`] writes untrusted source to a scratch workspace and runs
//!   it with an external interpreter.
//!
//! Every call spawns exactly one child process and awaits it. Children are
//! spawned with `kill_on_drop`, so a timed-out or abandoned call terminates
//! its process instead of leaking it.

pub mod command;
pub mod script;

pub use command::CommandGateway;
pub use script::{Interpreter, ScriptRunner};

use std::process::{Output, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::ExecError;

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured outcome of one process run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_status: Option<i32>,
}

impl ExecutionResult {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_status: output.status.code(),
        }
    }

    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// The observable output: stdout, or stderr when stdout is empty.
    pub fn output(&self) -> &str {
        if self.stdout.is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Build a command that runs `line` through the platform shell.
pub(crate) fn shell_command(line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}

/// Spawn `cmd`, wait for it under `timeout`, and capture both streams.
pub(crate) async fn capture(
    mut cmd: Command,
    timeout: Duration,
) -> Result<ExecutionResult, ExecError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| ExecError::ExecutionFailure {
        reason: format!("Failed to spawn process: {}", e),
        result: None,
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ExecutionResult::from_output(&output)),
        Ok(Err(e)) => Err(ExecError::ExecutionFailure {
            reason: format!("Failed to collect process output: {}", e),
            result: None,
        }),
        Err(_) => Err(ExecError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str, stderr: &str, code: Option<i32>) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_status: code,
        }
    }

    #[test]
    fn test_output_prefers_stdout() {
        assert_eq!(result("out", "err", Some(0)).output(), "out");
    }

    #[test]
    fn test_output_falls_back_to_stderr() {
        assert_eq!(result("", "err", Some(0)).output(), "err");
        assert_eq!(result("", "", Some(0)).output(), "");
    }

    #[test]
    fn test_success() {
        assert!(result("", "", Some(0)).success());
        assert!(!result("", "", Some(1)).success());
        assert!(!result("", "", None).success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_both_streams() {
        let out = capture(shell_command("echo out; echo err 1>&2"), DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(out.success());
    }

    #[tokio::test]
    async fn test_capture_spawn_failure() {
        let cmd = Command::new("sandpane-no-such-binary-7f3a");
        let err = capture(cmd, DEFAULT_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ExecError::ExecutionFailure { result: None, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_timeout() {
        let err = capture(shell_command("sleep 5"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout(_)));
    }
}
