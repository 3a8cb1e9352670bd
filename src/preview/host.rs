//! Lifecycle of one live preview.
//!
//! Every [`PreviewHost::refresh`] bumps a generation counter, discards the
//! current frame and starts loading a new one. Load completions carry the
//! generation they were started for and are dropped when a newer refresh has
//! happened since, so overlapping refreshes always settle on the last call.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::composer::Composer;
use super::frame::{FrameId, FrameLoader, IsolatedFrame, SandboxPolicy};
use super::message::parse_host_message;
use super::{DependencyMap, FileSet};
use crate::error::PreviewError;

/// Frame height before the frame reports its own.
pub const DEFAULT_FRAME_HEIGHT: u32 = 300;

/// Observable state of a [`PreviewHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PreviewState {
    Idle,
    Loading { generation: u64, frame_id: FrameId },
    Ready { generation: u64, frame_id: FrameId },
    Failed { generation: u64, reason: String },
}

impl PreviewState {
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Loading { generation, .. }
            | Self::Ready { generation, .. }
            | Self::Failed { generation, .. } => Some(*generation),
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    generation: u64,
    frame: Option<Arc<IsolatedFrame>>,
    load_task: Option<JoinHandle<()>>,
    height: u32,
    inputs: Option<(FileSet, DependencyMap)>,
}

/// Owns the single preview session of one view.
pub struct PreviewHost {
    composer: Composer,
    policy: SandboxPolicy,
    loader: Arc<dyn FrameLoader>,
    session: Arc<Mutex<Session>>,
    state_tx: Arc<watch::Sender<PreviewState>>,
}

impl PreviewHost {
    pub fn new(loader: Arc<dyn FrameLoader>) -> Self {
        let (state_tx, _) = watch::channel(PreviewState::Idle);
        Self {
            composer: Composer::new().with_resize_bridge(true),
            policy: SandboxPolicy::strict(),
            loader,
            session: Arc::new(Mutex::new(Session {
                height: DEFAULT_FRAME_HEIGHT,
                ..Session::default()
            })),
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn with_policy(mut self, policy: SandboxPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_composer(mut self, composer: Composer) -> Self {
        self.composer = composer;
        self
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Current state.
    pub fn state(&self) -> PreviewState {
        self.state_tx.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state_tx.subscribe()
    }

    pub async fn height(&self) -> u32 {
        self.session.lock().await.height
    }

    pub async fn current_frame(&self) -> Option<Arc<IsolatedFrame>> {
        self.session.lock().await.frame.clone()
    }

    /// Replace the preview with a fresh frame for `files` and `deps`.
    ///
    /// Returns the new frame's id immediately; loading continues in the
    /// background and is reported through [`subscribe`](Self::subscribe).
    pub async fn refresh(&self, files: FileSet, deps: DependencyMap) -> FrameId {
        let document = self.composer.compose(&files, &deps);
        let mut session = self.session.lock().await;

        self.discard_current(&mut session).await;
        session.generation += 1;
        let generation = session.generation;

        let frame = Arc::new(IsolatedFrame::new(generation, document, self.policy.clone()));
        let frame_id = frame.id;
        session.frame = Some(frame.clone());
        session.height = DEFAULT_FRAME_HEIGHT;
        session.inputs = Some((files, deps));

        tracing::debug!(generation, frame_id = %frame_id, "Loading preview frame");
        self.state_tx
            .send_replace(PreviewState::Loading { generation, frame_id });

        let loader = Arc::clone(&self.loader);
        let shared = Arc::clone(&self.session);
        let state_tx = Arc::clone(&self.state_tx);
        session.load_task = Some(tokio::spawn(async move {
            let outcome = loader.load(frame).await;
            finish_load(&shared, &state_tx, generation, frame_id, outcome).await;
        }));

        frame_id
    }

    /// Refresh again with the most recent inputs, e.g. after a failed load.
    pub async fn retry(&self) -> Option<FrameId> {
        let inputs = self.session.lock().await.inputs.clone();
        match inputs {
            Some((files, deps)) => Some(self.refresh(files, deps).await),
            None => None,
        }
    }

    /// Discard the current frame and return to `Idle`.
    pub async fn teardown(&self) {
        let mut session = self.session.lock().await;
        self.discard_current(&mut session).await;
        session.generation += 1;
        session.height = DEFAULT_FRAME_HEIGHT;
        session.inputs = None;
        self.state_tx.send_replace(PreviewState::Idle);
    }

    /// Handle a message posted by frame `source`.
    ///
    /// Returns whether the message was applied. Only well-formed resize
    /// messages from the current frame are; everything else is ignored.
    pub async fn handle_message(&self, source: FrameId, message: &Value) -> bool {
        let Some(resize) = parse_host_message(message) else {
            tracing::debug!(frame_id = %source, "Ignoring malformed frame message");
            return false;
        };

        let mut session = self.session.lock().await;
        match session.frame {
            Some(ref frame) if frame.id == source => {
                session.height = resize.height;
                true
            }
            _ => {
                tracing::debug!(frame_id = %source, "Ignoring message from superseded frame");
                false
            }
        }
    }

    async fn discard_current(&self, session: &mut Session) {
        if let Some(task) = session.load_task.take() {
            task.abort();
            // Wait for the abort so a late publish cannot outlive the unload.
            let _ = task.await;
        }
        if let Some(frame) = session.frame.take() {
            self.loader.unload(frame.id).await;
        }
    }
}

impl Drop for PreviewHost {
    /// Stops any load in flight and unloads the current frame.
    ///
    /// Unloading is async, so it runs on a task spawned onto the current
    /// runtime. Outside a runtime only the load task is aborted.
    fn drop(&mut self) {
        let session = Arc::clone(&self.session);
        let loader = Arc::clone(&self.loader);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            if let Ok(mut session) = session.try_lock()
                && let Some(task) = session.load_task.take()
            {
                task.abort();
            }
            return;
        };

        runtime.spawn(async move {
            let mut session = session.lock().await;
            if let Some(task) = session.load_task.take() {
                task.abort();
                let _ = task.await;
            }
            if let Some(frame) = session.frame.take() {
                tracing::debug!(frame_id = %frame.id, "Unloading frame of dropped preview host");
                loader.unload(frame.id).await;
            }
        });
    }
}

/// Apply a load outcome if it is still for the current generation.
///
/// Returns whether the outcome was applied.
async fn finish_load(
    session: &Mutex<Session>,
    state_tx: &watch::Sender<PreviewState>,
    generation: u64,
    frame_id: FrameId,
    outcome: Result<(), PreviewError>,
) -> bool {
    let mut session = session.lock().await;
    if session.generation != generation {
        tracing::debug!(
            generation,
            current = session.generation,
            "Discarding superseded preview load"
        );
        return false;
    }
    session.load_task = None;

    let state = match outcome {
        Ok(()) => PreviewState::Ready {
            generation,
            frame_id,
        },
        Err(e) => {
            tracing::warn!(generation, error = %e, "Preview failed to load");
            PreviewState::Failed {
                generation,
                reason: e.to_string(),
            }
        }
    };
    state_tx.send_replace(state);
    true
}
