//! Code block extraction from AI-generated message text.
//!
//! A message body is split into an ordered sequence of [`Segment`]s: runs of
//! plain text and fenced code blocks. The scanner is lazy and allocation-light;
//! [`Segments`] is `Clone`, so a sequence can be restarted from any point by
//! cloning the iterator.
//!
//! # Fence rules
//!
//! - An opening fence is three backticks followed by an info line that ends in
//!   a newline. The language tag is the first whitespace-delimited token of
//!   the info line.
//! - The code content ends at the first closing fence after the info line.
//! - Content is trimmed; the language tag never appears in it.
//! - An opening fence with no closing fence is malformed. Everything from the
//!   opening fence to the end of input is emitted as one text segment.

mod classify;

pub use classify::{ExecutionKind, ExecutionRequest};

use serde::{Deserialize, Serialize};

/// The delimiter that opens and closes a code block.
pub const FENCE: &str = "```";

/// Language tag used when a fence has no tag or an unrecognized one.
pub const PLAINTEXT: &str = "plaintext";

/// A contiguous run of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text, kept verbatim.
    Text { raw: String },
    /// A fenced code block.
    Code { language: String, content: String },
}

impl Segment {
    /// Create a text segment.
    pub fn text(raw: impl Into<String>) -> Self {
        Self::Text { raw: raw.into() }
    }

    /// Create a code segment.
    pub fn code(language: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Code {
            language: language.into(),
            content: content.into(),
        }
    }

    /// Whether this is a code segment.
    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code { .. })
    }

    /// The language tag of a code segment.
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Code { language, .. } => Some(language),
            Self::Text { .. } => None,
        }
    }
}

/// An unterminated fence that was recovered as plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MalformedSegment {
    /// Byte offset of the opening fence.
    pub offset: usize,
}

/// Lazy iterator over the segments of a message.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    text: &'a str,
    pos: usize,
    /// A code segment found while scanning text, emitted on the next call.
    pending: Option<Pending>,
    malformed: Option<MalformedSegment>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    lang_start: usize,
    lang_end: usize,
    body_start: usize,
    body_end: usize,
    /// Position right after the closing fence.
    next: usize,
}

/// Split `text` into segments.
pub fn segments(text: &str) -> Segments<'_> {
    Segments {
        text,
        pos: 0,
        pending: None,
        malformed: None,
    }
}

/// Collect all segments along with any recovered malformed fences.
pub fn extract_with_diagnostics(text: &str) -> (Vec<Segment>, Vec<MalformedSegment>) {
    let mut iter = segments(text);
    let mut out = Vec::new();
    let mut diagnostics = Vec::new();
    while let Some(segment) = iter.next() {
        out.push(segment);
        if let Some(m) = iter.malformed.take() {
            diagnostics.push(m);
        }
    }
    if let Some(m) = iter.malformed.take() {
        diagnostics.push(m);
    }
    (out, diagnostics)
}

/// Collect all segments.
pub fn extract(text: &str) -> Vec<Segment> {
    segments(text).collect()
}

/// Rebuild message text from segments, re-inserting fences.
///
/// Code blocks are written in canonical form: lower-case tag, then the
/// content followed by a single newline. Input already in that form is
/// reproduced exactly. Other input loses whitespace trimmed inside fences
/// and the info line is reduced to its normalized tag: anything after the
/// first word is dropped, and a missing or unrecognized tag becomes
/// `plaintext`.
pub fn reassemble(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text { raw } => out.push_str(raw),
            Segment::Code { language, content } => {
                out.push_str(FENCE);
                out.push_str(language);
                out.push('\n');
                if !content.is_empty() {
                    out.push_str(content);
                    out.push('\n');
                }
                out.push_str(FENCE);
            }
        }
    }
    out
}

impl Segments<'_> {
    /// Find the next well-formed fence at or after `from`.
    ///
    /// Returns `None` when there is none; records a diagnostic if the next
    /// opening fence is unterminated.
    fn find_fence(&mut self, from: usize) -> Option<(usize, Pending)> {
        let text = self.text;
        let mut search = from;
        while let Some(rel) = text[search..].find(FENCE) {
            let open = search + rel;
            let info_start = open + FENCE.len();
            let Some(nl) = text[info_start..].find('\n') else {
                // No info line terminator: cannot be an opening fence.
                return None;
            };
            let info_end = info_start + nl;
            let body_start = info_end + 1;

            if let Some(inline_close) = text[info_start..info_end].find(FENCE) {
                // Inline ```code``` on one line; skip past it.
                search = info_start + inline_close + FENCE.len();
                continue;
            }

            let Some(close_rel) = text[body_start..].find(FENCE) else {
                tracing::debug!(offset = open, "Unterminated code fence, keeping as text");
                self.malformed = Some(MalformedSegment { offset: open });
                return None;
            };
            let body_end = body_start + close_rel;

            let info = &text[info_start..info_end];
            let lead = info.len() - info.trim_start().len();
            let token_len = info.trim_start().split_whitespace().next().map_or(0, str::len);
            let lang_start = info_start + lead;

            return Some((
                open,
                Pending {
                    lang_start,
                    lang_end: lang_start + token_len,
                    body_start,
                    body_end,
                    next: body_end + FENCE.len(),
                },
            ));
        }
        None
    }

    fn code_segment(&self, p: Pending) -> Segment {
        Segment::Code {
            language: normalize_language(&self.text[p.lang_start..p.lang_end]),
            content: self.text[p.body_start..p.body_end].trim().to_string(),
        }
    }
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if let Some(p) = self.pending.take() {
            self.pos = p.next;
            return Some(self.code_segment(p));
        }

        if self.pos >= self.text.len() {
            return None;
        }

        match self.find_fence(self.pos) {
            Some((open, p)) if open > self.pos => {
                let raw = &self.text[self.pos..open];
                self.pending = Some(p);
                self.pos = open;
                Some(Segment::text(raw))
            }
            Some((_, p)) => {
                self.pos = p.next;
                Some(self.code_segment(p))
            }
            None => {
                let raw = &self.text[self.pos..];
                self.pos = self.text.len();
                Some(Segment::text(raw))
            }
        }
    }
}

/// Normalize a fence language tag.
///
/// Tags made only of `[A-Za-z0-9_+#.-]` are lower-cased; anything else
/// (including an absent tag) becomes [`PLAINTEXT`].
pub fn normalize_language(tag: &str) -> String {
    let recognized = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-'));
    if recognized {
        tag.to_ascii_lowercase()
    } else {
        PLAINTEXT.to_string()
    }
}
