//! Code execution and sandboxed preview engine for AI chat front-ends.
//!
//! - [`extract`] splits assistant messages into text and fenced code segments.
//! - [`exec`] runs shell commands through an allowlist gateway and scripts in
//!   scratch workspaces.
//! - [`preview`] composes HTML/CSS/JavaScript into one document and hosts it in
//!   an isolated frame.
//! - [`llm`] asks a text generator to turn a snippet into a preview bundle.
//! - [`server`] exposes all of the above over HTTP.

pub mod config;
pub mod error;
pub mod exec;
pub mod extract;
pub mod llm;
pub mod preview;
pub mod safety;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
