//! Allowlist policies for the command gateway.
//!
//! The baseline [`PrefixAllowlist`] is a raw `starts_with` test on the command
//! line. It is NOT a security boundary: `ls; rm -rf ~` starts with `ls`, and
//! `lsblk` starts with `ls` too. It exists for a trusted single-user tool and
//! is kept permissive on purpose. [`TokenAllowlist`] is the stricter opt-in.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

/// Commands permitted by default.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] =
    &["ls", "pwd", "mkdir", "git", "npm", "yarn", "pnpm", "node"];

/// Characters that let a shell run more than one program.
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '<', '>', '(', ')', '\n', '\r'];

/// Decides whether a command line may be executed.
pub trait CommandPolicy: Send + Sync {
    /// Short name used in logs and rejection errors.
    fn name(&self) -> &str;

    /// Whether `command_line` may run.
    fn is_allowed(&self, command_line: &str) -> bool;
}

/// Raw-string prefix allowlist.
#[derive(Debug, Clone)]
pub struct PrefixAllowlist {
    prefixes: Vec<String>,
}

impl PrefixAllowlist {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Default for PrefixAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_COMMANDS.iter().copied())
    }
}

impl CommandPolicy for PrefixAllowlist {
    fn name(&self) -> &str {
        "prefix"
    }

    fn is_allowed(&self, command_line: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| command_line.starts_with(prefix.as_str()))
    }
}

/// Tokenized allowlist.
///
/// The basename of the first word must be listed, and the line must not
/// contain shell metacharacters that could chain further commands.
#[derive(Debug, Clone)]
pub struct TokenAllowlist {
    allowed: BTreeSet<String>,
}

impl TokenAllowlist {
    pub fn new<I, S>(binaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: binaries.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a binary to the allowlist.
    pub fn allow(&mut self, binary: impl Into<String>) {
        self.allowed.insert(binary.into());
    }

    /// Remove a binary from the allowlist.
    pub fn deny(&mut self, binary: &str) {
        self.allowed.remove(binary);
    }

    /// List all allowed binaries, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.allowed.iter().map(String::as_str).collect()
    }

    /// Validate a command line, returning the reason on rejection.
    pub fn validate(&self, command_line: &str) -> Result<(), String> {
        let trimmed = command_line.trim();
        if trimmed.is_empty() {
            return Err("Empty command".to_string());
        }

        if let Some(c) = trimmed.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
            return Err(format!("Shell metacharacter {:?} is not permitted", c));
        }

        let first = trimmed.split_whitespace().next().unwrap_or(trimmed);
        let name = std::path::Path::new(first)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(first);

        if self.allowed.contains(name) {
            Ok(())
        } else {
            Err(format!("Binary '{}' is not in the allowlist", name))
        }
    }
}

impl Default for TokenAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_COMMANDS.iter().copied())
    }
}

impl CommandPolicy for TokenAllowlist {
    fn name(&self) -> &str {
        "token"
    }

    fn is_allowed(&self, command_line: &str) -> bool {
        self.validate(command_line).is_ok()
    }
}

/// Which policy implementation to build from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandPolicyKind {
    #[default]
    Prefix,
    Token,
}

impl CommandPolicyKind {
    /// Build the policy over `commands` plus `additional`, minus `denied`.
    ///
    /// Denials win over additions.
    pub fn build(
        self,
        commands: &[String],
        additional: &[String],
        denied: &[String],
    ) -> Arc<dyn CommandPolicy> {
        let mut allowlist = TokenAllowlist::new(commands.iter().cloned());
        for command in additional {
            allowlist.allow(command.clone());
        }
        for command in denied {
            allowlist.deny(command);
        }
        tracing::debug!(policy = ?self, commands = ?allowlist.list(), "Resolved command allowlist");

        match self {
            Self::Prefix => Arc::new(PrefixAllowlist::new(allowlist.list())),
            Self::Token => Arc::new(allowlist),
        }
    }
}

impl FromStr for CommandPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefix" | "startswith" | "starts_with" => Ok(Self::Prefix),
            "token" | "tokenized" | "strict" => Ok(Self::Token),
            other => Err(format!(
                "unknown command policy '{}', expected 'prefix' or 'token'",
                other
            )),
        }
    }
}

/// Report library-injection variables that every executed command inherits.
pub fn dangerous_env_vars() -> Vec<String> {
    const DANGEROUS: &[&str] = &[
        "LD_PRELOAD",
        "LD_LIBRARY_PATH",
        "LD_AUDIT",
        "DYLD_INSERT_LIBRARIES",
        "DYLD_LIBRARY_PATH",
        "DYLD_FRAMEWORK_PATH",
    ];

    DANGEROUS
        .iter()
        .filter(|var| std::env::var(var).is_ok_and(|v| !v.is_empty()))
        .map(|var| var.to_string())
        .collect()
}
