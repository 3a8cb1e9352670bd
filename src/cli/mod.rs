//! Command-line interface.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;

use sandpane::config::Config;
use sandpane::error::ExecError;
use sandpane::exec::ExecutionResult;
use sandpane::extract::{ExecutionKind, Segment, extract_with_diagnostics};
use sandpane::preview::{Composer, DependencyMap, FileSet};
use sandpane::server::{AppState, HttpServer, router};

#[derive(Parser, Debug)]
#[command(name = "sandpane")]
#[command(about = "Run code from AI chat replies and preview web snippets in a sandbox")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides SANDPANE_HTTP_ADDR)
        #[arg(long)]
        addr: Option<std::net::SocketAddr>,
    },

    /// Split a message into text and code segments
    Extract {
        /// Input file (stdin when omitted)
        file: Option<PathBuf>,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Run an allow-listed shell command
    Exec {
        /// Command line; multiple words are joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a script file in a scratch workspace
    Run {
        file: PathBuf,

        /// Interpreter program (overrides SANDPANE_SCRIPT_INTERPRETER)
        #[arg(long)]
        interpreter: Option<String>,
    },

    /// Compose a self-contained preview document
    Compose {
        #[arg(long)]
        html: Option<PathBuf>,

        #[arg(long)]
        css: Option<PathBuf>,

        #[arg(long)]
        js: Option<PathBuf>,

        /// Dependency as NAME=URL_OR_VERSION (repeatable)
        #[arg(long = "dep", value_parser = parse_dependency)]
        deps: Vec<(String, String)>,

        /// Include the resize-reporting script
        #[arg(long)]
        resize_bridge: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_dependency(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=URL_OR_VERSION, got '{}'", s)),
    }
}

pub async fn run_command(command: Command, config: Config) -> Result<ExitCode> {
    match command {
        Command::Serve { addr } => serve(config, addr).await,
        Command::Extract { file, json } => extract(file.as_deref(), json).await,
        Command::Exec { command } => {
            let line = command.join(" ");
            report(config.command_gateway().execute(&line).await)
        }
        Command::Run { file, interpreter } => {
            let source = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut config = config;
            if let Some(program) = interpreter {
                config.script.interpreter = program;
            }
            report(config.script_runner().run(&source).await)
        }
        Command::Compose {
            html,
            css,
            js,
            deps,
            resize_bridge,
            output,
        } => {
            let files = FileSet {
                html: read_optional(html.as_deref()).await?,
                css: read_optional(css.as_deref()).await?,
                js: read_optional(js.as_deref()).await?,
            };
            if files.is_empty() {
                bail!("Nothing to compose: pass at least one of --html, --css, --js");
            }
            let deps: DependencyMap = deps.into_iter().collect();
            let document = Composer::new()
                .with_resize_bridge(resize_bridge)
                .compose(&files, &deps);
            match output {
                Some(path) => tokio::fs::write(&path, document.as_str())
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{}", document),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn serve(config: Config, addr: Option<std::net::SocketAddr>) -> Result<ExitCode> {
    let state = Arc::new(AppState::from_config(&config));
    if state.generator.is_none() {
        tracing::info!("GEMINI_API_KEY not set, /api/preview is disabled");
    }

    let mut server = HttpServer::new(addr.unwrap_or(config.http_addr));
    server.start(router(state)).await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    server.shutdown().await;
    Ok(ExitCode::SUCCESS)
}

async fn extract(file: Option<&Path>, json: bool) -> Result<ExitCode> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };

    let (segments, malformed) = extract_with_diagnostics(&text);

    if json {
        let body = serde_json::json!({ "segments": segments, "malformed": malformed });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(ExitCode::SUCCESS);
    }

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Text { raw } => println!("[{}] text ({} bytes)", i, raw.len()),
            Segment::Code { language, content } => {
                let action = match segment.execution_request().map(|r| r.kind) {
                    Some(ExecutionKind::Command) => " [command]",
                    Some(ExecutionKind::Script) => " [script]",
                    None if segment.preview_files().is_some() => " [preview]",
                    None => "",
                };
                println!("[{}] code {}{} ({} lines)", i, language, action, content.lines().count());
            }
        }
    }
    for m in &malformed {
        eprintln!("warning: unterminated code fence at byte {}", m.offset);
    }
    Ok(ExitCode::SUCCESS)
}

async fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

/// Print an execution outcome the way the chat UI shows it.
fn report(outcome: std::result::Result<ExecutionResult, ExecError>) -> Result<ExitCode> {
    match outcome {
        Ok(result) => {
            print!("{}", result.output());
            Ok(ExitCode::SUCCESS)
        }
        Err(ExecError::RejectedCommand { command, policy }) => {
            eprintln!("Command not allowed by {} policy: {}", policy, command);
            Ok(ExitCode::from(126))
        }
        Err(e @ ExecError::Timeout(_)) => {
            eprintln!("{}", e);
            Ok(ExitCode::from(124))
        }
        Err(e) => {
            eprint!("{}", e.display_text());
            let code = match e {
                ExecError::ExecutionFailure {
                    result: Some(ref r),
                    ..
                }
                | ExecError::ScriptError { result: ref r } => {
                    r.exit_status.and_then(|c| u8::try_from(c).ok()).filter(|c| *c != 0)
                }
                _ => None,
            };
            Ok(ExitCode::from(code.unwrap_or(1)))
        }
    }
}
