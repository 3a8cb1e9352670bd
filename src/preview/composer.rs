//! Assembly of self-contained preview documents.

use std::fmt;

use url::Url;

use super::dom::{Document, Element, Node};
use super::skeleton;
use super::{DependencyMap, FileSet};

/// CDN used for dependencies given as bare version strings.
pub const CDN_BASE: &str = "https://cdn.jsdelivr.net/npm";

/// Title of the generated default skeleton.
const DEFAULT_TITLE: &str = "Preview";

/// Script that reports the document height to the embedding page.
///
/// A classic script in `<head>` so it is registered before any user code
/// runs and does not depend on module loading succeeding.
const RESIZE_BRIDGE: &str = "(function () {
  function postHeight() {
    var height = document.documentElement.scrollHeight;
    window.parent.postMessage({ type: \"resize\", height: height }, \"*\");
  }
  window.addEventListener(\"load\", postHeight);
  window.addEventListener(\"resize\", postHeight);
})();";

/// A fully assembled preview document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComposedDocument(String);

impl ComposedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ComposedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a dependency is referenced from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Stylesheet,
    Script,
}

/// A dependency resolved to a loadable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub name: String,
    pub url: String,
    pub kind: DependencyKind,
}

impl DependencyRef {
    /// Resolve a dependency entry.
    ///
    /// `source` is either an absolute `http(s)` URL, used as is, or a version
    /// string resolved against the npm CDN. Entries with any other URL scheme
    /// are refused.
    pub fn resolve(name: &str, source: &str) -> Option<Self> {
        let source = source.trim();
        let url = if source.starts_with("//") {
            source.to_string()
        } else {
            match Url::parse(source) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => source.to_string(),
                Ok(url) => {
                    tracing::warn!(dependency = name, scheme = url.scheme(), "Refusing dependency URL");
                    return None;
                }
                // Not an absolute URL: a version string.
                Err(_) => cdn_url(name, source),
            }
        };

        let kind = if is_stylesheet_path(name) || is_stylesheet_path(url_path(&url)) {
            DependencyKind::Stylesheet
        } else {
            DependencyKind::Script
        };

        Some(Self {
            name: name.to_string(),
            url,
            kind,
        })
    }

    fn to_element(&self) -> Element {
        match self.kind {
            DependencyKind::Stylesheet => Element::new("link")
                .attr("rel", "stylesheet")
                .attr("href", &self.url),
            DependencyKind::Script => Element::new("script").attr("src", &self.url),
        }
    }
}

/// `https://cdn.jsdelivr.net/npm/{package}@{version}/{subpath}`
fn cdn_url(name: &str, version: &str) -> String {
    // Scoped packages keep their scope: "@scope/pkg/sub" → ("@scope/pkg", "sub").
    let segments = if name.starts_with('@') { 2 } else { 1 };
    let mut parts = name.splitn(segments + 1, '/');
    let package: Vec<&str> = parts.by_ref().take(segments).collect();
    let package = package.join("/");
    let subpath = parts.next();

    let mut url = format!("{}/{}", CDN_BASE, package);
    if !version.is_empty() && version != "latest" {
        url.push('@');
        url.push_str(version);
    }
    if let Some(sub) = subpath {
        url.push('/');
        url.push_str(sub);
    }
    url
}

fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

fn is_stylesheet_path(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".css")
}

/// Builds [`ComposedDocument`]s.
///
/// Output is a pure function of the inputs and the composer options.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    resize_bridge: bool,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the script that posts `{type: "resize", height}` to the parent.
    pub fn with_resize_bridge(mut self, enabled: bool) -> Self {
        self.resize_bridge = enabled;
        self
    }

    /// Compose a document from `files` and `deps`.
    ///
    /// Injection order: dependency references, then the inline stylesheet
    /// (both at the end of `<head>`), then the module script at the end of
    /// `<body>`. Missing files compose as empty content.
    pub fn compose(&self, files: &FileSet, deps: &DependencyMap) -> ComposedDocument {
        if files.css.is_none() {
            tracing::debug!("Preview has no styles.css, composing with empty stylesheet");
        }
        if files.js.is_none() {
            tracing::debug!("Preview has no index.js, composing with empty script");
        }

        let (doctype, mut html, mut head, mut body) = match files.html.as_deref() {
            Some(source) if !source.trim().is_empty() => from_source(source),
            _ => default_skeleton(),
        };

        for dep in deps
            .iter()
            .filter_map(|(name, source)| DependencyRef::resolve(name, source))
        {
            head.push(dep.to_element().into());
        }

        head.push(Element::raw_text("style", files.css.clone().unwrap_or_default()).into());

        if self.resize_bridge {
            head.push(Element::raw_text("script", RESIZE_BRIDGE).into());
        }

        body.push(
            Element::raw_text("script", files.js.clone().unwrap_or_default())
                .attr("type", "module")
                .into(),
        );

        html.push(head.into());
        html.push(body.into());

        let document = Document { doctype, root: html };
        ComposedDocument(document.to_html())
    }
}

/// Compose with default options (no resize bridge).
pub fn compose(files: &FileSet, deps: &DependencyMap) -> ComposedDocument {
    Composer::new().compose(files, deps)
}

fn default_skeleton() -> (String, Element, Element, Element) {
    let html = Element::new("html").attr("lang", "en");
    let head = Element::new("head")
        .child(Element::new("meta").attr("charset", "UTF-8").into())
        .child(
            Element::new("meta")
                .attr("name", "viewport")
                .attr("content", "width=device-width, initial-scale=1.0")
                .into(),
        )
        .child(Element::new("title").child(Node::Text(DEFAULT_TITLE.to_string())).into());
    let body = Element::new("body");
    ("<!DOCTYPE html>".to_string(), html, head, body)
}

fn from_source(source: &str) -> (String, Element, Element, Element) {
    let parts = skeleton::split(source);

    let mut html = Element::new("html");
    html.source_attrs = parts.html_attrs;
    let mut head = Element::new("head");
    head.source_attrs = parts.head_attrs;
    if !parts.head_inner.is_empty() {
        head.push(Node::Markup(parts.head_inner));
    }
    let mut body = Element::new("body");
    body.source_attrs = parts.body_attrs;
    if !parts.body_inner.is_empty() {
        body.push(Node::Markup(parts.body_inner));
    }

    let doctype = parts
        .doctype
        .unwrap_or_else(|| "<!DOCTYPE html>".to_string());
    (doctype, html, head, body)
}
