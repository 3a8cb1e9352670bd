//! Environment-driven configuration.
//!
//! `Config::from_env` loads `.env` (if present) and reads `SANDPANE_*`
//! variables. Every value has a default, so an empty environment is valid.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::exec::{CommandGateway, DEFAULT_TIMEOUT, Interpreter, ScriptRunner};
use crate::llm::gemini::{DEFAULT_MODEL, GeminiConfig, GeminiGenerator};
use crate::llm::TextGenerator;
use crate::preview::SandboxPolicy;
use crate::safety::{CommandPolicyKind, DEFAULT_ALLOWED_COMMANDS};

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:3030";

/// Command gateway settings.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub policy: CommandPolicyKind,
    pub allowed_commands: Vec<String>,
    /// Appended to `allowed_commands`.
    pub additional_commands: Vec<String>,
    /// Removed from the resolved list, overriding additions.
    pub denied_commands: Vec<String>,
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

/// Script runner settings.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub interpreter: String,
    pub file_name: String,
    pub timeout: Duration,
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub exec: ExecConfig,
    pub script: ScriptConfig,
    pub preview_interactive: bool,
    pub http_addr: SocketAddr,
    pub gemini: Option<GeminiConfig>,
    pub log_json: bool,
}

impl Config {
    /// Load `.env`, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let policy = match get("SANDPANE_COMMAND_POLICY") {
            Some(v) => v.parse::<CommandPolicyKind>().map_err(|message| ConfigError::InvalidValue {
                key: "SANDPANE_COMMAND_POLICY".to_string(),
                message,
            })?,
            None => CommandPolicyKind::default(),
        };

        let allowed_commands = match get("SANDPANE_ALLOWED_COMMANDS") {
            Some(v) => parse_list(&v),
            None => DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let exec = ExecConfig {
            policy,
            allowed_commands,
            additional_commands: get("SANDPANE_ALLOWED_COMMANDS_ADDITIONAL")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            denied_commands: get("SANDPANE_DENIED_COMMANDS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            timeout: parse_secs("SANDPANE_COMMAND_TIMEOUT_SECS", get("SANDPANE_COMMAND_TIMEOUT_SECS"))?,
            working_dir: get("SANDPANE_WORKDIR").map(PathBuf::from),
        };

        let script = ScriptConfig {
            interpreter: get("SANDPANE_SCRIPT_INTERPRETER").unwrap_or_else(|| "python3".to_string()),
            file_name: get("SANDPANE_SCRIPT_FILE").unwrap_or_else(|| "script.py".to_string()),
            timeout: parse_secs("SANDPANE_SCRIPT_TIMEOUT_SECS", get("SANDPANE_SCRIPT_TIMEOUT_SECS"))?,
            temp_dir: get("SANDPANE_TEMP_DIR").map(PathBuf::from),
        };

        let http_addr = get("SANDPANE_HTTP_ADDR")
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SANDPANE_HTTP_ADDR".to_string(),
                message: format!("{}", e),
            })?;

        let gemini = get("GEMINI_API_KEY").map(|key| {
            let model = get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
            GeminiConfig::new(key, model)
        });

        let log_json = get("SANDPANE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            exec,
            script,
            preview_interactive: parse_bool(
                "SANDPANE_PREVIEW_INTERACTIVE",
                get("SANDPANE_PREVIEW_INTERACTIVE"),
            )?,
            http_addr,
            gemini,
            log_json,
        })
    }

    pub fn command_gateway(&self) -> CommandGateway {
        let policy = self.exec.policy.build(
            &self.exec.allowed_commands,
            &self.exec.additional_commands,
            &self.exec.denied_commands,
        );
        let gateway = CommandGateway::new(policy).with_timeout(self.exec.timeout);
        match self.exec.working_dir {
            Some(ref dir) => gateway.with_working_dir(dir.clone()),
            None => gateway,
        }
    }

    pub fn script_runner(&self) -> ScriptRunner {
        let interpreter = Interpreter::new(&self.script.interpreter, &self.script.file_name);
        let runner = ScriptRunner::new(interpreter).with_timeout(self.script.timeout);
        match self.script.temp_dir {
            Some(ref dir) => runner.with_temp_root(dir.clone()),
            None => runner,
        }
    }

    pub fn sandbox_policy(&self) -> SandboxPolicy {
        if self.preview_interactive {
            SandboxPolicy::interactive()
        } else {
            SandboxPolicy::strict()
        }
    }

    /// The configured text generator, if an API key is set.
    pub fn text_generator(&self) -> Option<Arc<dyn TextGenerator>> {
        self.gemini
            .clone()
            .map(|config| Arc::new(GeminiGenerator::new(config)) as Arc<dyn TextGenerator>)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_secs(key: &str, value: Option<String>) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(DEFAULT_TIMEOUT);
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected whole seconds: {}", e),
        }),
    }
}

fn parse_bool(key: &str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}
