//! Interpreted script execution in scratch workspaces.
//!
//! Each call gets its own randomly named directory under the temp root,
//! so concurrent runs never share files and one run's cleanup cannot touch
//! another's workspace. The directory is removed on every exit path: the
//! normal paths close it explicitly, and `TempDir`'s `Drop` covers panics and
//! cancelled futures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use super::{DEFAULT_TIMEOUT, ExecutionResult, capture};
use crate::error::ExecError;

/// Name prefix for scratch workspaces.
const WORKSPACE_PREFIX: &str = "sandpane-script-";

/// An external interpreter and the file name its scripts are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
    pub file_name: String,
}

impl Interpreter {
    pub fn new(program: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            file_name: file_name.into(),
        }
    }

    /// `python3 script.py`
    pub fn python() -> Self {
        Self::new("python3", "script.py")
    }

    /// Extra arguments placed before the script path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::python()
    }
}

/// Runs untrusted source with an external interpreter.
///
/// Any stderr output is reported as [`ExecError::ScriptError`], even when the
/// interpreter exits with status zero. Interpreters that print warnings to
/// stderr therefore fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    interpreter: Interpreter,
    temp_root: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ScriptRunner {
    pub fn new(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            temp_root: None,
            timeout: None,
        }
    }

    /// Create workspaces under `root` instead of the system temp directory.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Run `source` and return its captured output.
    pub async fn run(&self, source: &str) -> Result<ExecutionResult, ExecError> {
        let workspace = self.create_workspace()?;
        let workspace_path = workspace.path().to_path_buf();
        tracing::debug!(workspace = %workspace_path.display(), "Created script workspace");

        let outcome = self.run_in(&workspace_path, source).await;

        if let Err(e) = workspace.close() {
            tracing::warn!(
                workspace = %workspace_path.display(),
                error = %e,
                "Failed to remove script workspace"
            );
        }

        let result = outcome?;

        if !result.stderr.is_empty() {
            return Err(ExecError::ScriptError { result });
        }
        if !result.success() {
            let reason = match result.exit_status {
                Some(code) => format!("{} exited with status {}", self.interpreter.program, code),
                None => format!("{} terminated by signal", self.interpreter.program),
            };
            return Err(ExecError::ExecutionFailure {
                reason,
                result: Some(result),
            });
        }

        Ok(result)
    }

    fn create_workspace(&self) -> Result<tempfile::TempDir, ExecError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let created = match self.temp_root {
            Some(ref root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        created.map_err(|e| ExecError::ExecutionFailure {
            reason: format!("Failed to create script workspace: {}", e),
            result: None,
        })
    }

    async fn run_in(&self, workspace: &Path, source: &str) -> Result<ExecutionResult, ExecError> {
        let script_path = workspace.join(&self.interpreter.file_name);
        tokio::fs::write(&script_path, source)
            .await
            .map_err(|e| ExecError::ExecutionFailure {
                reason: format!("Failed to write script: {}", e),
                result: None,
            })?;

        let mut cmd = Command::new(&self.interpreter.program);
        cmd.args(&self.interpreter.args)
            .arg(&script_path)
            .current_dir(workspace);

        tracing::info!(interpreter = %self.interpreter.program, "Running script");
        capture(cmd, self.timeout.unwrap_or(DEFAULT_TIMEOUT)).await
    }
}
