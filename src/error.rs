//! Error types for sandpane.

use std::net::SocketAddr;
use std::time::Duration;

use crate::exec::ExecutionResult;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the command gateway and the script runner.
///
/// `RejectedCommand` is an authorization failure: nothing was executed.
/// Every other variant means a process was (or was about to be) started.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Invalid execution request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Command not allowed by {policy} policy: {command}")]
    RejectedCommand { command: String, policy: String },

    #[error("Execution failed: {reason}")]
    ExecutionFailure {
        reason: String,
        /// Captured output when the process ran to completion.
        result: Option<ExecutionResult>,
    },

    #[error("Script wrote to stderr: {}", .result.stderr.trim_end())]
    ScriptError { result: ExecutionResult },

    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),
}

impl ExecError {
    /// Text to show the user for this failure.
    ///
    /// Captured process output is the product here, so it is preferred over
    /// the generic message whenever there is any.
    pub fn display_text(&self) -> String {
        match self {
            Self::ScriptError { result } => result.stderr.clone(),
            Self::ExecutionFailure {
                result: Some(result),
                ..
            } if !result.output().is_empty() => result.output().to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the failure is a policy rejection rather than a failed run.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RejectedCommand { .. })
    }
}

/// Preview host errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreviewError {
    #[error("Preview failed to load: {reason}")]
    LoadFailed { reason: String },

    #[error("Preview load superseded by generation {newer}")]
    Superseded { newer: u64 },

    #[error("Preview session '{id}' not found")]
    SessionNotFound { id: uuid::Uuid },
}

/// Text generator errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed { addr: SocketAddr, reason: String },

    #[error("Server is already running")]
    AlreadyRunning,
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
