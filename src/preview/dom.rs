//! Minimal HTML node tree and serializer.
//!
//! Documents are assembled as nodes and serialized in one pass, so injected
//! content is always escaped for the context it lands in:
//! - text and attribute values are entity-escaped;
//! - raw-text element bodies (`<script>`, `<style>`) have any closing-tag or
//!   comment-open sequence neutralized so the element cannot end early.

use std::fmt::Write;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, entity-escaped on output.
    Text(String),
    /// Markup taken verbatim from a caller-supplied document.
    Markup(String),
    /// Body of a raw-text element such as `<script>` or `<style>`.
    RawText(String),
}

/// An HTML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, Option<String>)>,
    /// Attribute text copied verbatim from a caller-supplied opening tag.
    pub source_attrs: String,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            source_attrs: String::new(),
            children: Vec::new(),
        }
    }

    /// Add a `name="value"` attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), Some(value.into())));
        self
    }

    /// Add a valueless attribute such as `defer`.
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.attrs.push((name.into(), None));
        self
    }

    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    /// An element whose only child is a raw-text body.
    pub fn raw_text(tag: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(tag).child(Node::RawText(body.into()))
    }

    /// Serialize this element and its children.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            if let Some(value) = value {
                let _ = write!(out, "=\"{}\"", escape_attr(value));
            }
        }
        if !self.source_attrs.trim().is_empty() {
            out.push(' ');
            out.push_str(self.source_attrs.trim());
        }
        out.push('>');

        if self.is_void() {
            return;
        }

        for child in &self.children {
            match child {
                Node::Element(el) => el.write_to(out),
                Node::Text(text) => out.push_str(&escape_text(text)),
                Node::Markup(markup) => out.push_str(markup),
                Node::RawText(body) => out.push_str(&escape_raw_text(body, &self.tag)),
            }
        }

        let _ = write!(out, "</{}>", self.tag);
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

/// A whole document: doctype line plus the root `<html>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub doctype: String,
    pub root: Element,
}

impl Document {
    /// Serialize the document.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if !self.doctype.is_empty() {
            out.push_str(&self.doctype);
            out.push('\n');
        }
        self.root.write_to(&mut out);
        out
    }
}

/// Escape character data.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape an attribute value for use inside double quotes.
pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Neutralize sequences that would end a raw-text element early.
///
/// `</tag` (any case) becomes `<\/tag` and `<!--` becomes `<\!--`. Both are
/// inert rewrites inside JavaScript strings and CSS.
pub fn escape_raw_text(body: &str, tag: &str) -> String {
    let closing = format!("</{}", tag.to_ascii_lowercase());
    let lower = body.to_ascii_lowercase();
    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    let mut i = 0;
    while i < body.len() {
        let rest = &lower[i..];
        if rest.starts_with(&closing) {
            out.push_str(&body[last..i]);
            out.push_str("<\\/");
            last = i + 2;
            i += closing.len();
        } else if rest.starts_with("<!--") {
            out.push_str(&body[last..i]);
            out.push_str("<\\!");
            last = i + 2;
            i += 4;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    out.push_str(&body[last..]);
    out
}
