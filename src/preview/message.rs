//! Messages posted by a preview frame to its host.
//!
//! Frames run untrusted code, so anything they send is parsed strictly: the
//! only accepted message is `{"type": "resize", "height": <number>}` with a
//! finite, non-negative height and no other keys.

use serde::Serialize;
use serde_json::Value;

/// Upper bound for a frame height in pixels.
pub const MAX_FRAME_HEIGHT: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResizeMessage {
    /// Height in whole pixels, rounded up and clamped to [`MAX_FRAME_HEIGHT`].
    pub height: u32,
}

/// Parse a message received from a frame. Returns `None` for anything that is
/// not a well-formed resize message.
pub fn parse_host_message(value: &Value) -> Option<ResizeMessage> {
    let object = value.as_object()?;
    if object.len() != 2 || object.get("type")?.as_str()? != "resize" {
        return None;
    }

    let height = object.get("height")?.as_f64()?;
    if !height.is_finite() || height < 0.0 {
        return None;
    }

    Some(ResizeMessage {
        height: height.ceil().min(MAX_FRAME_HEIGHT as f64) as u32,
    })
}

/// Parse a message received as serialized JSON.
pub fn parse_host_message_str(raw: &str) -> Option<ResizeMessage> {
    serde_json::from_str::<Value>(raw)
        .ok()
        .as_ref()
        .and_then(parse_host_message)
}
