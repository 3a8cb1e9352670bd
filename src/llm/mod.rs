//! Text generation backends.
//!
//! The engine only needs one capability from a language model: turn a prompt
//! into text. [`TextGenerator`] is that seam; [`gemini::GeminiGenerator`] is
//! the bundled implementation.

pub mod chat;
pub mod gemini;
pub mod preview_prompt;
pub mod project;

pub use chat::{ChatMessage, ChatReply, build_chat_prompt, generate_chat_reply};
pub use gemini::{GeminiConfig, GeminiGenerator};
pub use preview_prompt::{
    PreviewBundle, build_preview_prompt, generate_preview_bundle, parse_preview_bundle,
};
pub use project::{ProjectNode, ProjectTree, build_project_prompt, generate_project, parse_project_tree};

use async_trait::async_trait;

use crate::error::LlmError;

/// Produces text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name used in errors and logs.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// The outermost `{...}` span of generated text.
///
/// Models often wrap JSON in prose or a fence, so the span runs from the
/// first `{` to the last `}`.
pub(crate) fn json_object_span(text: &str) -> Option<&str> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
        _ => None,
    }
}

/// Attribute a response error to `provider`.
pub(crate) fn retag(err: LlmError, provider: &str) -> LlmError {
    match err {
        LlmError::InvalidResponse { reason, .. } => LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason,
        },
        other => other,
    }
}
