//! Gemini orchestrator: offers an MCP server's tools to a Gemini model and
//! resolves the function calls it makes.

use anyhow::{Context, Result};
use clap::Parser;
use mcp_gemini::agent::{self, AgentLoopConfig, ConsoleHooks, Mode};
use mcp_gemini::config::{self, Config};
use mcp_gemini::gemini::GeminiClient;
use mcp_gemini::mcp::McpClient;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mcp-gemini")]
#[command(about = "Let a Gemini model call tools served over MCP")]
struct Args {
    /// Config file layered on top of the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// One function-call round, or a bounded loop
    #[arg(long, value_enum, default_value_t = Mode::Loop)]
    mode: Mode,

    /// Prompt sent to the model
    #[arg(long)]
    prompt: Option<String>,

    /// Gemini model id
    #[arg(long, env = "GEMINI_MODEL")]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Cap on function-call rounds in loop mode
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Server command (defaults to the bundled mcp-tool-server)
    #[arg(long, env = "MCP_SERVER_COMMAND")]
    server_command: Option<String>,

    /// Arguments passed to the server command
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    server_args: Vec<String>,
}

impl Args {
    /// Flags override every config file
    fn apply(&self, config: &mut Config) {
        if let Some(prompt) = &self.prompt {
            config.agent.prompt = prompt.clone();
        }
        if let Some(model) = &self.model {
            config.gemini.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.gemini.temperature = temperature;
        }
        if let Some(n) = self.max_iterations {
            config.agent.max_iterations = n;
        }
        if let Some(command) = &self.server_command {
            config.server.command = command.clone();
        }
        if !self.server_args.is_empty() {
            config.server.args = self.server_args.clone();
        }
    }
}

fn main() {
    // before logging so RUST_LOG may come from .env
    let dotenv = config::load_dotenv();
    mcp_gemini::logging::init("info");
    if let Err(e) = dotenv.and_then(|()| run()) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let api_key = config.gemini.resolve_api_key()?;
    let model = GeminiClient::new(&config.gemini, api_key).context("failed to build Gemini client")?;

    let mut client = McpClient::spawn(&config.server)?;
    client.initialize("mcp-gemini")?;

    let loop_config = AgentLoopConfig::default()
        .with_mode(args.mode)
        .with_max_iterations(config.agent.max_iterations)
        .with_temperature(config.gemini.temperature);

    let report = agent::run(&model, &mut client, &ConsoleHooks, &loop_config, &config.agent.prompt)?;
    tracing::info!(
        iterations = report.iterations,
        tool_calls = report.tool_calls,
        hit_cap = report.hit_iteration_cap,
        "run finished"
    );

    client.shutdown(Duration::from_secs(2))
}
