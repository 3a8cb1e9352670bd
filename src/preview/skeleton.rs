//! Structural split of a caller-supplied HTML document.
//!
//! The composer needs to know where the real `<head>` and `<body>` are, not
//! where the first `</head>` substring is. The scanner walks the markup tag by
//! tag, skipping comments and the bodies of raw-text elements, so a string
//! like `"</body>"` inside a script or comment is never taken for a boundary.

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// A supplied document split into its structural parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skeleton {
    /// `<!DOCTYPE ...>` as written, if present.
    pub doctype: Option<String>,
    pub html_attrs: String,
    pub head_attrs: String,
    pub head_inner: String,
    pub body_attrs: String,
    pub body_inner: String,
    /// Construct left open at the end of input. Already closed in `body_inner`.
    pub unclosed: Option<Unclosed>,
}

/// A construct still open when the input ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unclosed {
    /// `<!--` without `-->`.
    Comment,
    /// A raw-text element such as `<script>` without its end tag.
    RawText(String),
    /// A tag or declaration without `>`, possibly inside a quoted value.
    Tag { quote: Option<char> },
}

impl Unclosed {
    /// Markup that closes the construct.
    pub fn closer(&self) -> String {
        match self {
            Self::Comment => "-->".to_string(),
            Self::RawText(name) => format!("</{}>", name),
            Self::Tag { quote: Some(q) } => format!("{}>", q),
            Self::Tag { quote: None } => ">".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tag {
    name: String,
    closing: bool,
    start: usize,
    /// Byte offset just past the closing `>`.
    end: usize,
    attrs: String,
}

#[derive(Debug, Default)]
struct Scan {
    tags: Vec<Tag>,
    doctype: Option<(usize, usize)>,
    unclosed: Option<Unclosed>,
}

/// Split `html` into doctype, head and body parts.
///
/// No content is dropped. Markup before `<body>` without a `<head>` tag, or a
/// head whose `</head>` is omitted, becomes the head. A fragment without
/// `<head>`/`<body>` becomes the body, an unclosed `<body>` runs to the end of
/// input, and stray content after `</body>` or `</html>` is kept in the body.
/// A comment, raw-text element or tag left open at the end of input is closed
/// so that markup appended to the body is not swallowed by it.
pub fn split(html: &str) -> Skeleton {
    let Scan {
        tags,
        doctype,
        unclosed,
    } = scan(html);
    let find = |name: &str, closing: bool| {
        tags.iter()
            .find(|t| t.name == name && t.closing == closing)
    };

    let html_open = find("html", false);
    let html_close = tags.iter().rev().find(|t| t.name == "html" && t.closing);
    let head_open = find("head", false);
    let head_close = find("head", true);
    let body_open = find("body", false);
    let body_close = tags.iter().rev().find(|t| t.name == "body" && t.closing);

    let mut skeleton = Skeleton {
        doctype: doctype.map(|(s, e)| html[s..e].to_string()),
        html_attrs: html_open.map(|t| t.attrs.clone()).unwrap_or_default(),
        ..Skeleton::default()
    };

    // Start of content: after <html>, else after the doctype, else 0.
    let content_start = html_open
        .map(|t| t.end)
        .or(doctype.map(|(_, e)| e))
        .unwrap_or(0);
    let content_end = html_close
        .map(|t| t.start)
        .filter(|end| *end >= content_start)
        .unwrap_or(html.len());

    let body_from = match head_open {
        Some(open) if open.start >= content_start => {
            skeleton.head_attrs = open.attrs.clone();
            let close = head_close.filter(|c| c.start >= open.end);
            let body_at = body_open.filter(|b| b.start >= open.end);
            // The head ends at </head>, or at <body> when </head> is omitted.
            let (inner_end, next) = match (close, body_at) {
                (Some(c), Some(b)) if b.start < c.start => (b.start, b.start),
                (Some(c), _) => (c.start, c.end),
                (None, Some(b)) => (b.start, b.start),
                (None, None) => (open.end, open.end),
            };
            push_content(&mut skeleton.head_inner, &html[content_start..open.start]);
            skeleton.head_inner.push_str(&html[open.end..inner_end]);
            next
        }
        _ => match body_open {
            Some(open) if open.start >= content_start => {
                push_content(&mut skeleton.head_inner, &html[content_start..open.start]);
                open.start
            }
            _ => content_start,
        },
    };

    match body_open {
        Some(open) if open.start >= body_from => {
            skeleton.body_attrs = open.attrs.clone();
            push_content(&mut skeleton.body_inner, &html[body_from..open.start]);
            let end = match body_close {
                Some(close) if close.start >= open.end && close.start <= content_end => {
                    close.start
                }
                _ => content_end.max(open.end),
            };
            skeleton.body_inner.push_str(&html[open.end..end]);
            if let Some(close) = body_close
                && close.start >= open.end
                && close.end < content_end
            {
                push_content(&mut skeleton.body_inner, &html[close.end..content_end]);
            }
        }
        _ => {
            let end = content_end.max(body_from);
            skeleton.body_inner.push_str(&html[body_from..end]);
        }
    }

    if let Some(close) = html_close
        && close.start >= content_start
    {
        push_content(&mut skeleton.body_inner, &html[close.end..]);
    }

    if let Some(open) = &unclosed {
        tracing::debug!(construct = ?open, "Closing markup left open at end of input");
        skeleton.body_inner.push_str(&open.closer());
    }
    skeleton.unclosed = unclosed;

    skeleton
}

/// Append `piece` unless it is only whitespace.
fn push_content(out: &mut String, piece: &str) {
    if !piece.trim().is_empty() {
        out.push_str(piece);
    }
}

/// Tokenize tags, skipping comments and raw-text bodies.
fn scan(html: &str) -> Scan {
    let bytes = html.as_bytes();
    let mut out = Scan::default();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &html[i..];

        if rest.starts_with("<!--") {
            match rest[4..].find("-->") {
                Some(p) => i += 4 + p + 3,
                None => {
                    out.unclosed = Some(Unclosed::Comment);
                    break;
                }
            }
            continue;
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            let Some(p) = rest.find('>') else {
                out.unclosed = Some(Unclosed::Tag { quote: None });
                break;
            };
            let end = i + p + 1;
            let is_doctype = rest
                .get(2..9)
                .is_some_and(|kw| kw.eq_ignore_ascii_case("doctype"));
            if out.doctype.is_none() && is_doctype {
                out.doctype = Some((i, end));
            }
            i = end;
            continue;
        }

        let closing = rest.starts_with("</");
        let name_start = if closing { i + 2 } else { i + 1 };
        let name_len = html[name_start..]
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
            .count();
        if name_len == 0 || !bytes[name_start].is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let name = html[name_start..name_start + name_len].to_ascii_lowercase();
        let attrs_start = name_start + name_len;
        let end = match find_tag_end(html, attrs_start) {
            Ok(end) => end,
            Err(quote) => {
                out.unclosed = Some(Unclosed::Tag { quote });
                break;
            }
        };
        let attrs_end = end - 1;
        let attrs = html[attrs_start..attrs_end]
            .trim_end_matches('/')
            .to_string();

        let self_closing = html[attrs_start..attrs_end].trim_end().ends_with('/');
        out.tags.push(Tag {
            name: name.clone(),
            closing,
            start: i,
            end,
            attrs,
        });
        i = end;

        if !closing && !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            match find_raw_text_end(html, i, &name) {
                Some(close) => i = close,
                None => {
                    out.unclosed = Some(Unclosed::RawText(name));
                    break;
                }
            }
        }
    }

    out
}

/// Offset just past the `>` ending a tag, honoring quoted attribute values.
///
/// Fails with the open quote, if any, when the input ends first.
fn find_tag_end(html: &str, from: usize) -> Result<usize, Option<char>> {
    let mut quote: Option<u8> = None;
    for (offset, b) in html[from..].bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Ok(from + offset + 1),
            None => {}
        }
    }
    Err(quote.map(char::from))
}

/// Offset of the `</name` that closes a raw-text element.
fn find_raw_text_end(html: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    let lower = html[from..].to_ascii_lowercase();
    lower.find(&needle).map(|p| from + p)
}
