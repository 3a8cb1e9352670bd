//! Ask a text generator to turn a code snippet into a runnable preview.

use serde::{Deserialize, Serialize};

use super::{TextGenerator, json_object_span, retag};
use crate::error::LlmError;
use crate::preview::{DependencyMap, FileSet};

/// Files plus dependencies, as returned by the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewBundle {
    #[serde(default)]
    pub files: FileSet,
    #[serde(default)]
    pub dependencies: DependencyMap,
}

/// Prompt asking for a JSON preview bundle for `code` written in `language`.
pub fn build_preview_prompt(code: &str, language: &str) -> String {
    format!(
        r#"Convert the following code into a runnable HTML/CSS/JavaScript preview.
Language: {language}
Code:
{code}

Respond with JSON in exactly this shape:
{{
  "files": {{
    "index.html": "HTML markup",
    "styles.css": "CSS",
    "index.js": "JavaScript"
  }},
  "dependencies": {{
    "package name": "CDN URL"
  }}
}}
"#
    )
}

/// Extract the bundle from generated text.
///
/// Models often wrap the JSON in prose or a fence, so the outermost span from
/// the first `{` to the last `}` is parsed.
pub fn parse_preview_bundle(text: &str) -> Result<PreviewBundle, LlmError> {
    let Some(span) = json_object_span(text) else {
        return Err(LlmError::InvalidResponse {
            provider: "preview".to_string(),
            reason: "No JSON object in response".to_string(),
        });
    };

    serde_json::from_str(span).map_err(|e| LlmError::InvalidResponse {
        provider: "preview".to_string(),
        reason: format!("Malformed preview JSON: {}", e),
    })
}

/// Generate a preview bundle for a snippet.
pub async fn generate_preview_bundle(
    generator: &dyn TextGenerator,
    code: &str,
    language: &str,
) -> Result<PreviewBundle, LlmError> {
    if code.trim().is_empty() || language.trim().is_empty() {
        return Err(LlmError::InvalidRequest {
            reason: "Code and language are required".to_string(),
        });
    }

    let prompt = build_preview_prompt(code, language);
    let text = generator.generate(&prompt).await?;
    let bundle = parse_preview_bundle(&text).map_err(|e| retag(e, generator.name()))?;

    tracing::info!(
        provider = generator.name(),
        dependencies = bundle.dependencies.len(),
        "Generated preview bundle"
    );
    Ok(bundle)
}
