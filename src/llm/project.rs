//! Multi-file project scaffolds generated from a description.

use serde::{Deserialize, Serialize};

use super::{TextGenerator, json_object_span, retag};
use crate::error::LlmError;

/// A file or directory in a generated project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectNode {
    File {
        name: String,
        #[serde(default)]
        content: String,
    },
    Directory {
        name: String,
        #[serde(default)]
        children: Vec<ProjectNode>,
    },
}

impl ProjectNode {
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }
}

/// Top level of a generated project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTree {
    #[serde(default)]
    pub files: Vec<ProjectNode>,
}

impl ProjectTree {
    /// Every file as `(path, content)`, depth first, paths joined with `/`.
    pub fn flatten(&self) -> Vec<(String, &str)> {
        let mut out = Vec::new();
        for node in &self.files {
            collect(node, "", &mut out);
        }
        out
    }
}

fn collect<'a>(node: &'a ProjectNode, prefix: &str, out: &mut Vec<(String, &'a str)>) {
    let path = if prefix.is_empty() {
        node.name().to_string()
    } else {
        format!("{}/{}", prefix, node.name())
    };
    match node {
        ProjectNode::File { content, .. } => out.push((path, content.as_str())),
        ProjectNode::Directory { children, .. } => {
            for child in children {
                collect(child, &path, out);
            }
        }
    }
}

/// Prompt asking for a JSON file tree that satisfies `requirements`.
pub fn build_project_prompt(requirements: &str) -> String {
    format!(
        r#"You are an expert code generator. Produce the files and directory
structure needed for the requirements below. The code must actually run.

Respond with JSON in exactly this shape:
{{
  "files": [
    {{ "name": "file name", "type": "file", "content": "file contents" }},
    {{
      "name": "directory name",
      "type": "directory",
      "children": [
        {{ "name": "file name", "type": "file", "content": "file contents" }}
      ]
    }}
  ]
}}

Requirements:
{requirements}
"#
    )
}

/// Extract the project tree from generated text.
pub fn parse_project_tree(text: &str) -> Result<ProjectTree, LlmError> {
    let Some(span) = json_object_span(text) else {
        return Err(LlmError::InvalidResponse {
            provider: "project".to_string(),
            reason: "No JSON object in response".to_string(),
        });
    };
    serde_json::from_str(span).map_err(|e| LlmError::InvalidResponse {
        provider: "project".to_string(),
        reason: format!("Malformed project JSON: {}", e),
    })
}

/// Generate a project scaffold for `requirements`.
pub async fn generate_project(
    generator: &dyn TextGenerator,
    requirements: &str,
) -> Result<ProjectTree, LlmError> {
    if requirements.trim().is_empty() {
        return Err(LlmError::InvalidRequest {
            reason: "Prompt is required".to_string(),
        });
    }

    let text = generator.generate(&build_project_prompt(requirements)).await?;
    let tree = parse_project_tree(&text).map_err(|e| retag(e, generator.name()))?;
    tracing::info!(
        provider = generator.name(),
        nodes = tree.files.len(),
        "Generated project scaffold"
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            assert!(prompt.contains("Requirements:"));
            Ok(self.0.to_string())
        }
    }

    const TREE: &str = r#"Here is your project:
{"files": [
  {"name": "README.md", "type": "file", "content": "demo"},
  {"name": "src", "type": "directory", "children": [
    {"name": "main.py", "type": "file", "content": "print(1)"},
    {"name": "util", "type": "directory", "children": [
      {"name": "__init__.py", "type": "file"}
    ]}
  ]}
]}"#;

    #[test]
    fn test_parse_nested_tree() {
        let tree = parse_project_tree(TREE).unwrap();
        assert_eq!(tree.files.len(), 2);
        assert_eq!(
            tree.flatten(),
            vec![
                ("README.md".to_string(), "demo"),
                ("src/main.py".to_string(), "print(1)"),
                ("src/util/__init__.py".to_string(), ""),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_node_type() {
        let err = parse_project_tree(r#"{"files": [{"name": "x", "type": "link"}]}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_generate_project() {
        let tree = generate_project(&Canned(TREE), "a python demo").await.unwrap();
        assert_eq!(tree.files[1].name(), "src");
    }

    #[tokio::test]
    async fn test_generate_requires_prompt() {
        let err = generate_project(&Canned(TREE), "  ").await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_generate_reports_provider_on_bad_response() {
        match generate_project(&Canned("no tree"), "x").await {
            Err(LlmError::InvalidResponse { provider, .. }) => assert_eq!(provider, "canned"),
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }
}
