//! Sandboxed HTML/CSS/JavaScript previews.
//!
//! [`Composer`] turns a [`FileSet`] plus a [`DependencyMap`] into one
//! self-contained [`ComposedDocument`]. [`PreviewHost`] renders composed
//! documents in isolated frames and listens for the frame's resize messages.
//! [`PreviewSessions`] keeps one host per HTTP preview session.
//!
//! ```text
//!  FileSet + DependencyMap
//!          │
//!          ▼
//!     ┌──────────┐   skeleton::split    ┌───────────┐
//!     │ Composer │ ───────────────────▶ │ dom::Node │ ──▶ ComposedDocument
//!     └──────────┘                      └───────────┘          │
//!                                                              ▼
//!     ┌─────────────┐  refresh()   ┌───────────────┐   load   ┌─────────────┐
//!     │ PreviewHost │ ───────────▶ │ IsolatedFrame │ ───────▶ │ FrameLoader │
//!     └─────────────┘              └───────────────┘          └─────────────┘
//!            ▲
//!            └──── {type: "resize", height} from the current frame only
//! ```

pub mod composer;
pub mod dom;
pub mod frame;
pub mod host;
pub mod message;
pub mod sessions;
pub mod skeleton;

pub use composer::{ComposedDocument, Composer, DependencyKind, DependencyRef, compose};
pub use frame::{FrameId, FrameLoader, FrameRegistry, IsolatedFrame, SandboxPolicy};
pub use host::{DEFAULT_FRAME_HEIGHT, PreviewHost, PreviewState};
pub use message::{ResizeMessage, parse_host_message, parse_host_message_str};
pub use sessions::{PreviewSessions, SessionId, SessionStatus};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Package or asset identifier → URL or version string.
///
/// Ordered so that composed output is deterministic.
pub type DependencyMap = BTreeMap<String, String>;

/// The files of a preview bundle.
///
/// Serialized with the file names as keys. `script.js` is accepted as an
/// alias for `index.js`; any other key is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    #[serde(rename = "index.html", default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(rename = "styles.css", default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(
        rename = "index.js",
        alias = "script.js",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub js: Option<String>,
}

impl FileSet {
    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.css.is_none() && self.js.is_none()
    }
}
