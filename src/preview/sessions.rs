//! Preview sessions served over HTTP.
//!
//! Each session owns one [`PreviewHost`], so a refresh replaces that
//! session's frame instead of adding another. The number of sessions is
//! bounded; creating one past the limit tears down the least recently used.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::composer::Composer;
use super::frame::{FrameId, FrameRegistry, SandboxPolicy};
use super::host::{PreviewHost, PreviewState};
use super::{DependencyMap, FileSet};
use crate::error::PreviewError;

/// Default maximum number of live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 32;

/// How long [`PreviewSessions::settle`] waits for a load to finish.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

pub type SessionId = Uuid;

/// Snapshot of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub state: PreviewState,
    pub frame_id: Option<FrameId>,
    pub height: u32,
}

struct Entry {
    host: Arc<PreviewHost>,
    touched_at: DateTime<Utc>,
}

/// Bounded set of [`PreviewHost`]s publishing into one [`FrameRegistry`].
#[derive(Clone)]
pub struct PreviewSessions {
    sessions: Arc<RwLock<HashMap<SessionId, Entry>>>,
    frames: FrameRegistry,
    composer: Composer,
    policy: SandboxPolicy,
    max_sessions: usize,
}

impl PreviewSessions {
    pub fn new(frames: FrameRegistry, policy: SandboxPolicy) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            frames,
            composer: Composer::new().with_resize_bridge(true),
            policy,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn frames(&self) -> &FrameRegistry {
        &self.frames
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Start a session showing `files` and `deps`.
    pub async fn create(&self, files: FileSet, deps: DependencyMap) -> (SessionId, FrameId) {
        let host = Arc::new(
            PreviewHost::new(Arc::new(self.frames.clone()))
                .with_policy(self.policy.clone())
                .with_composer(self.composer.clone()),
        );
        let session_id = Uuid::new_v4();

        let evicted = {
            let mut sessions = self.sessions.write().await;
            let evicted = if sessions.len() >= self.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.touched_at)
                    .map(|(id, _)| *id);
                oldest.and_then(|id| sessions.remove(&id).map(|entry| (id, entry.host)))
            } else {
                None
            };
            sessions.insert(
                session_id,
                Entry {
                    host: Arc::clone(&host),
                    touched_at: Utc::now(),
                },
            );
            evicted
        };

        if let Some((id, old)) = evicted {
            tracing::info!(session_id = %id, "Evicting least recently used preview session");
            old.teardown().await;
        }

        let frame_id = host.refresh(files, deps).await;
        tracing::debug!(session_id = %session_id, frame_id = %frame_id, "Created preview session");
        (session_id, frame_id)
    }

    /// Replace a session's preview. The previous frame is unpublished.
    pub async fn refresh(
        &self,
        id: SessionId,
        files: FileSet,
        deps: DependencyMap,
    ) -> Result<FrameId, PreviewError> {
        let host = self.touch(id).await?;
        Ok(host.refresh(files, deps).await)
    }

    /// Reload a session with its most recent inputs.
    pub async fn retry(&self, id: SessionId) -> Result<Option<FrameId>, PreviewError> {
        let host = self.touch(id).await?;
        Ok(host.retry().await)
    }

    /// Deliver a message posted by frame `source` to session `id`.
    pub async fn deliver(
        &self,
        id: SessionId,
        source: FrameId,
        message: &Value,
    ) -> Result<bool, PreviewError> {
        let host = self.touch(id).await?;
        Ok(host.handle_message(source, message).await)
    }

    pub async fn status(&self, id: SessionId) -> Result<SessionStatus, PreviewError> {
        let host = self.host(id).await?;
        Ok(SessionStatus {
            session_id: id,
            state: host.state(),
            frame_id: host.current_frame().await.map(|frame| frame.id),
            height: host.height().await,
        })
    }

    /// Wait until `frame_id` is no longer loading, then report the session.
    pub async fn settle(
        &self,
        id: SessionId,
        frame_id: FrameId,
    ) -> Result<SessionStatus, PreviewError> {
        let host = self.host(id).await?;
        let mut states = host.subscribe();
        let timed_out = tokio::time::timeout(
            SETTLE_TIMEOUT,
            states.wait_for(|state| {
                !matches!(state, PreviewState::Loading { frame_id: loading, .. } if *loading == frame_id)
            }),
        )
        .await
        .is_err();
        if timed_out {
            tracing::warn!(session_id = %id, frame_id = %frame_id, "Preview still loading");
        }
        self.status(id).await
    }

    /// Tear a session down and forget it.
    pub async fn close(&self, id: SessionId) -> Result<(), PreviewError> {
        let entry = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(PreviewError::SessionNotFound { id })?;
        entry.host.teardown().await;
        tracing::debug!(session_id = %id, "Closed preview session");
        Ok(())
    }

    async fn host(&self, id: SessionId) -> Result<Arc<PreviewHost>, PreviewError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|entry| Arc::clone(&entry.host))
            .ok_or(PreviewError::SessionNotFound { id })
    }

    async fn touch(&self, id: SessionId) -> Result<Arc<PreviewHost>, PreviewError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or(PreviewError::SessionNotFound { id })?;
        entry.touched_at = Utc::now();
        Ok(Arc::clone(&entry.host))
    }
}
