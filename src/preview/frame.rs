//! Isolated frames and the registry that serves them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::composer::ComposedDocument;
use super::dom::Element;
use crate::error::PreviewError;

/// Default maximum number of published frames.
const DEFAULT_MAX_FRAMES: usize = 64;

/// Default maximum document size in bytes (2 MB).
const DEFAULT_MAX_DOCUMENT_SIZE: usize = 2 * 1_048_576;

pub type FrameId = Uuid;

/// Capabilities granted to an isolated frame.
///
/// Scripts always run; same-origin access and top-level navigation are never
/// granted, so a frame cannot read the host's storage or navigate it away.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    #[serde(default)]
    pub allow_popups: bool,
    #[serde(default)]
    pub allow_modals: bool,
}

impl SandboxPolicy {
    /// Scripts only.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Scripts plus popups and modal dialogs.
    pub fn interactive() -> Self {
        Self {
            allow_popups: true,
            allow_modals: true,
        }
    }

    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut caps = vec!["allow-scripts"];
        if self.allow_popups {
            caps.push("allow-popups");
        }
        if self.allow_modals {
            caps.push("allow-modals");
        }
        caps
    }

    /// Value for an iframe `sandbox` attribute.
    pub fn attribute_value(&self) -> String {
        self.capabilities().join(" ")
    }

    /// Value for a `Content-Security-Policy` header serving the document.
    pub fn csp_header(&self) -> String {
        format!("sandbox {}", self.attribute_value())
    }
}

/// One rendering of a composed document.
///
/// Frames are never mutated: a refresh discards the frame and creates a new
/// one with a fresh id.
#[derive(Debug, Clone, Serialize)]
pub struct IsolatedFrame {
    pub id: FrameId,
    pub generation: u64,
    #[serde(skip)]
    pub document: ComposedDocument,
    pub policy: SandboxPolicy,
    pub created_at: DateTime<Utc>,
}

impl IsolatedFrame {
    pub fn new(generation: u64, document: ComposedDocument, policy: SandboxPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            document,
            policy,
            created_at: Utc::now(),
        }
    }

    /// `<iframe>` markup embedding the document inline via `srcdoc`.
    pub fn embed_markup(&self, height: u32) -> String {
        Element::new("iframe")
            .attr("title", "Preview")
            .attr("sandbox", self.policy.attribute_value())
            .attr("style", format!("width:100%;border:0;height:{}px", height))
            .attr("srcdoc", self.document.as_str())
            .to_html()
    }
}

/// Makes a frame's document available to the rendering side.
#[async_trait]
pub trait FrameLoader: Send + Sync {
    /// Load `frame`. Completes when the frame is ready to render.
    async fn load(&self, frame: Arc<IsolatedFrame>) -> Result<(), PreviewError>;

    /// Release everything held for `id`. Unknown ids are ignored.
    async fn unload(&self, id: FrameId);
}

/// In-memory store of published frames, served over HTTP.
#[derive(Debug, Clone)]
pub struct FrameRegistry {
    frames: Arc<RwLock<HashMap<FrameId, Arc<IsolatedFrame>>>>,
    max_frames: usize,
    max_document_size: usize,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_FRAMES, DEFAULT_MAX_DOCUMENT_SIZE)
    }

    pub fn with_limits(max_frames: usize, max_document_size: usize) -> Self {
        Self {
            frames: Arc::new(RwLock::new(HashMap::new())),
            max_frames,
            max_document_size,
        }
    }

    pub async fn get(&self, id: FrameId) -> Option<Arc<IsolatedFrame>> {
        self.frames.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.frames.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.frames.read().await.is_empty()
    }

    /// Publish a frame, replacing any frame with the same id.
    pub async fn publish(&self, frame: Arc<IsolatedFrame>) -> Result<(), PreviewError> {
        if frame.document.len() > self.max_document_size {
            return Err(PreviewError::LoadFailed {
                reason: format!(
                    "Document size {} exceeds maximum {}",
                    frame.document.len(),
                    self.max_document_size
                ),
            });
        }

        let mut frames = self.frames.write().await;
        if !frames.contains_key(&frame.id) && frames.len() >= self.max_frames {
            return Err(PreviewError::LoadFailed {
                reason: format!("Maximum number of frames ({}) reached", self.max_frames),
            });
        }

        tracing::debug!(frame_id = %frame.id, generation = frame.generation, "Published frame");
        frames.insert(frame.id, frame);
        Ok(())
    }

    pub async fn remove(&self, id: FrameId) -> bool {
        self.frames.write().await.remove(&id).is_some()
    }
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameLoader for FrameRegistry {
    async fn load(&self, frame: Arc<IsolatedFrame>) -> Result<(), PreviewError> {
        self.publish(frame).await
    }

    async fn unload(&self, id: FrameId) {
        if self.remove(id).await {
            tracing::debug!(frame_id = %id, "Unpublished frame");
        }
    }
}
