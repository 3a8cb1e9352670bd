//! Classification of code segments into user-triggerable actions.

use serde::{Deserialize, Serialize};

use super::Segment;
use crate::preview::FileSet;

/// Languages whose blocks are shell command lines.
const SHELL_LANGUAGES: &[&str] = &["bash", "sh", "shell", "console", "zsh"];

/// Languages run by the script runner.
const SCRIPT_LANGUAGES: &[&str] = &["python", "python3", "py"];

/// What kind of execution a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    Command,
    Script,
}

/// A request to run the content of a code segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub kind: ExecutionKind,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ExecutionRequest {
    pub fn command(payload: impl Into<String>) -> Self {
        Self {
            kind: ExecutionKind::Command,
            payload: payload.into(),
            language: None,
        }
    }

    pub fn script(payload: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            kind: ExecutionKind::Script,
            payload: payload.into(),
            language: Some(language.into()),
        }
    }
}

/// Whether content looks like a pasted terminal line (`$ cmd` or `> cmd`).
pub fn has_prompt_marker(content: &str) -> bool {
    content.starts_with('$') || content.starts_with('>')
}

/// Remove a leading `$`/`>` prompt marker from every line.
fn strip_prompt_markers(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            line.strip_prefix('$')
                .or_else(|| line.strip_prefix('>'))
                .map(str::trim_start)
                .unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Segment {
    /// The execution this segment offers, if any.
    pub fn execution_request(&self) -> Option<ExecutionRequest> {
        let Self::Code { language, content } = self else {
            return None;
        };

        if has_prompt_marker(content) {
            return Some(ExecutionRequest {
                language: Some(language.clone()),
                ..ExecutionRequest::command(strip_prompt_markers(content))
            });
        }
        if SHELL_LANGUAGES.contains(&language.as_str()) {
            return Some(ExecutionRequest {
                language: Some(language.clone()),
                ..ExecutionRequest::command(content.clone())
            });
        }
        if SCRIPT_LANGUAGES.contains(&language.as_str()) {
            return Some(ExecutionRequest::script(content.clone(), language.clone()));
        }
        None
    }

    /// A single-file preview bundle for web-language segments.
    pub fn preview_files(&self) -> Option<FileSet> {
        let Self::Code { language, content } = self else {
            return None;
        };
        let content = content.clone();
        match language.as_str() {
            "html" | "htm" => Some(FileSet {
                html: Some(content),
                ..FileSet::default()
            }),
            "css" => Some(FileSet {
                css: Some(content),
                ..FileSet::default()
            }),
            "javascript" | "js" => Some(FileSet {
                js: Some(content),
                ..FileSet::default()
            }),
            _ => None,
        }
    }
}
