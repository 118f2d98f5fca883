//! Layered configuration for the orchestrator.
//!
//! Priority, lowest first: built-in defaults, `~/.mcp-gemini/config.toml`,
//! `.mcp-gemini/config.toml`, `.mcp-gemini/config.local.toml`, an explicit
//! `--config` file, then command-line flags.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = ".mcp-gemini";

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-preview-03-25";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PROMPT: &str = "What's the current Bitcoin price in RUB?";
pub const TOOL_SERVER_BIN: &str = "mcp-tool-server";

/// Environment variables consulted for the Gemini key, in order
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

/// Gemini endpoint and sampling settings
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Extra variable checked before [`API_KEY_VARS`]
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            api_key_env: None,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    /// Resolve the API key from config or environment
    pub fn resolve_api_key(&self) -> Result<SecretString> {
        if let Some(key) = &self.api_key {
            return Ok(SecretString::from(key.clone()));
        }

        let vars = self
            .api_key_env
            .iter()
            .map(String::as_str)
            .chain(API_KEY_VARS);
        for var in vars {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    return Ok(SecretString::from(key));
                }
            }
        }

        bail!("API_KEY environment variable not set")
    }
}

/// How to launch the MCP tool server
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: default_server_command(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            timeout_ms: 30_000,
        }
    }
}

impl McpServerConfig {
    /// Per-request response timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The tool server installed next to the running binary, else whatever
/// `mcp-tool-server` resolves to on PATH.
fn default_server_command() -> String {
    let sibling = std::env::current_exe().ok().and_then(|exe| {
        let path = exe
            .parent()?
            .join(format!("{}{}", TOOL_SERVER_BIN, std::env::consts::EXE_SUFFIX));
        path.is_file().then_some(path)
    });
    match sibling {
        Some(path) => path.to_string_lossy().into_owned(),
        None => TOOL_SERVER_BIN.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: crate::agent::DEFAULT_MAX_ITERATIONS,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub server: McpServerConfig,
    pub agent: AgentConfig,
}

/// One config file. Every field is optional so a layer only overrides what
/// it names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub gemini: GeminiSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub agent: AgentSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    pub max_iterations: Option<usize>,
    pub prompt: Option<String>,
}

impl Config {
    /// Load configuration from default paths, then `explicit` if given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(CONFIG_DIR).join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // should be gitignored
        let local_config = Path::new(CONFIG_DIR).join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        if let Some(path) = explicit {
            config.merge(Self::load_from(path)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a single config file
    pub fn load_from(path: &Path) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Merge a file layer into this config (the layer takes priority)
    pub fn merge(&mut self, other: ConfigFile) {
        let g = other.gemini;
        if let Some(v) = g.base_url {
            self.gemini.base_url = v;
        }
        if let Some(v) = g.model {
            self.gemini.model = v;
        }
        if let Some(v) = g.temperature {
            self.gemini.temperature = v;
        }
        if g.api_key_env.is_some() {
            self.gemini.api_key_env = g.api_key_env;
        }
        if g.api_key.is_some() {
            self.gemini.api_key = g.api_key;
        }
        if let Some(v) = g.timeout_secs {
            self.gemini.timeout_secs = v;
        }

        let s = other.server;
        if let Some(v) = s.command {
            self.server.command = v;
        }
        if let Some(v) = s.args {
            self.server.args = v;
        }
        self.server.env.extend(s.env);
        if s.cwd.is_some() {
            self.server.cwd = s.cwd;
        }
        if let Some(v) = s.timeout_ms {
            self.server.timeout_ms = v;
        }

        let a = other.agent;
        if let Some(v) = a.max_iterations {
            self.agent.max_iterations = v;
        }
        if let Some(v) = a.prompt {
            self.agent.prompt = v;
        }
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be at least 1");
        }
        if self.server.command.trim().is_empty() {
            bail!("server.command must not be empty");
        }
        if !(0.0..=2.0).contains(&self.gemini.temperature) {
            bail!(
                "gemini.temperature must be between 0.0 and 2.0, got {}",
                self.gemini.temperature
            );
        }
        Ok(())
    }
}

/// Load a `.env` file from the working directory if there is one
pub fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env");
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).context("failed to load .env"),
    }
}
