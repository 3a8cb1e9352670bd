//! Allow-listed shell command execution.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{DEFAULT_TIMEOUT, ExecutionResult, capture, shell_command};
use crate::error::ExecError;
use crate::safety::{CommandPolicy, PrefixAllowlist};

/// Runs command lines that pass the configured [`CommandPolicy`].
///
/// The full line goes through the platform shell, inheriting the process
/// environment. With the default prefix policy an allowed leading word can
/// still be followed by arbitrary shell syntax; see
/// [`crate::safety::command_policy`].
#[derive(Clone)]
pub struct CommandGateway {
    policy: Arc<dyn CommandPolicy>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl CommandGateway {
    /// Create a gateway with the given policy and the default timeout.
    pub fn new(policy: Arc<dyn CommandPolicy>) -> Self {
        Self {
            policy,
            timeout: DEFAULT_TIMEOUT,
            working_dir: None,
        }
    }

    /// Set the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run commands in `dir` instead of the current working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn policy(&self) -> &dyn CommandPolicy {
        self.policy.as_ref()
    }

    /// Validate and run a command line.
    pub async fn execute(&self, command_line: &str) -> Result<ExecutionResult, ExecError> {
        if command_line.trim().is_empty() {
            return Err(ExecError::InvalidRequest {
                reason: "Command is required".to_string(),
            });
        }

        if !self.policy.is_allowed(command_line) {
            tracing::warn!(
                policy = self.policy.name(),
                command = command_line,
                "Rejected command"
            );
            return Err(ExecError::RejectedCommand {
                command: command_line.to_string(),
                policy: self.policy.name().to_string(),
            });
        }

        let mut cmd = shell_command(command_line);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::info!(command = command_line, "Executing command");
        let result = capture(cmd, self.timeout).await.inspect_err(|e| {
            tracing::warn!(command = command_line, error = %e, "Command did not complete");
        })?;

        if !result.success() {
            let reason = match result.exit_status {
                Some(code) => format!("Command exited with status {}", code),
                None => "Command terminated by signal".to_string(),
            };
            return Err(ExecError::ExecutionFailure {
                reason,
                result: Some(result),
            });
        }

        Ok(result)
    }
}

impl Default for CommandGateway {
    fn default() -> Self {
        Self::new(Arc::new(PrefixAllowlist::default()))
    }
}

impl std::fmt::Debug for CommandGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGateway")
            .field("policy", &self.policy.name())
            .field("timeout", &self.timeout)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn gateway_with(commands: &[&str]) -> CommandGateway {
        CommandGateway::new(Arc::new(PrefixAllowlist::new(commands.iter().copied())))
    }

    #[tokio::test]
    async fn test_rejects_unlisted_command() {
        let gateway = CommandGateway::default();
        let err = gateway.execute("rm -rf /").await.unwrap_err();
        assert!(matches!(err, ExecError::RejectedCommand { .. }));
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_empty_command_is_invalid() {
        let gateway = CommandGateway::default();
        let err = gateway.execute("   ").await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_ls_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        let gateway = CommandGateway::default().with_working_dir(dir.path());
        let result = gateway.execute("ls -la").await.unwrap();
        assert!(result.success());
        assert!(result.output().contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_mkdir_mutates_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = CommandGateway::default().with_working_dir(dir.path());
        gateway.execute("mkdir created").await.unwrap();
        assert!(dir.path().join("created").is_dir());
    }

    #[tokio::test]
    async fn test_stderr_substituted_when_stdout_empty() {
        let gateway = gateway_with(&["echo"]);
        let result = gateway.execute("echo oops 1>&2").await.unwrap();
        assert!(result.stdout.is_empty());
        assert_eq!(result.output(), "oops\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_execution_failure() {
        let gateway = CommandGateway::default();
        let err = gateway
            .execute("ls /sandpane/definitely/missing")
            .await
            .unwrap_err();
        match err {
            ExecError::ExecutionFailure {
                result: Some(result),
                ..
            } => {
                assert!(!result.success());
                assert!(!result.stderr.is_empty());
            }
            other => panic!("expected ExecutionFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let gateway = gateway_with(&["sleep"]).with_timeout(Duration::from_millis(100));
        let err = gateway.execute("sleep 5").await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_concurrent_commands_are_independent() {
        let gateway = gateway_with(&["echo"]);
        let (a, b) = tokio::join!(gateway.execute("echo a"), gateway.execute("echo b"));
        assert_eq!(a.unwrap().stdout, "a\n");
        assert_eq!(b.unwrap().stdout, "b\n");
    }
}
