//! Chat replies whose code arrives in fenced, language-tagged blocks.

use serde::{Deserialize, Serialize};

use super::TextGenerator;
use crate::error::LlmError;
use crate::extract::{Segment, extract};

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: default_role(),
            content: content.into(),
        }
    }
}

/// A generated reply, raw and already split into segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub content: String,
    pub segments: Vec<Segment>,
}

/// Prompt for answering `question` so the reply can be split into segments.
pub fn build_chat_prompt(question: &str) -> String {
    format!(
        r#"You are an expert programming assistant. Follow these rules:

1. Put every piece of code in a fenced block tagged with its language:
   ```language
   code
   ```
2. Explain the code before or after the block, never inside it.
3. Use precise language tags such as python, javascript, typescript, bash.
4. When the code can be previewed in a browser, also include the preview as
   separate ```html, ```css and ```javascript blocks.

User question:
{question}
"#
    )
}

/// Answer the last message of `messages`.
///
/// Only the last message is sent, matching the single-turn prompt.
pub async fn generate_chat_reply(
    generator: &dyn TextGenerator,
    messages: &[ChatMessage],
) -> Result<ChatReply, LlmError> {
    let Some(last) = messages.last() else {
        return Err(LlmError::InvalidRequest {
            reason: "Invalid request: messages array is empty".to_string(),
        });
    };
    if last.content.trim().is_empty() {
        return Err(LlmError::InvalidRequest {
            reason: "Invalid message format: content is required".to_string(),
        });
    }

    let content = generator.generate(&build_chat_prompt(&last.content)).await?;
    if content.trim().is_empty() {
        return Err(LlmError::InvalidResponse {
            provider: generator.name().to_string(),
            reason: "Empty chat response".to_string(),
        });
    }

    let segments = extract(&content);
    tracing::info!(
        provider = generator.name(),
        segments = segments.len(),
        "Generated chat reply"
    );
    Ok(ChatReply { content, segments })
}
