//! Plain MCP client: spawns the tool server, lists its tools, calls one and
//! fetches the `prompt_test` prompt when the server offers prompts.

use anyhow::{Context, Result};
use clap::Parser;
use mcp_gemini::config::Config;
use mcp_gemini::mcp::McpClient;
use mcp_gemini::value::Arguments;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mcp-client")]
#[command(about = "Call one tool on an MCP server over stdio")]
struct Args {
    /// Config file layered on top of the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server command (defaults to the bundled mcp-tool-server)
    #[arg(long, env = "MCP_SERVER_COMMAND")]
    server_command: Option<String>,

    /// Arguments passed to the server command
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Tool to call
    #[arg(long, default_value = "hello")]
    tool: String,

    /// Tool arguments as a JSON object
    #[arg(long, default_value = r#"{"name":"World!"}"#)]
    args: String,

    /// Title passed to the prompt_test prompt
    #[arg(long, default_value = "Hello MCP")]
    title: String,
}

fn main() {
    mcp_gemini::logging::init("info");
    if let Err(e) = run() {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(command) = args.server_command {
        config.server.command = command;
    }
    if !args.server_args.is_empty() {
        config.server.args = args.server_args;
    }

    let tool_args: serde_json::Value =
        serde_json::from_str(&args.args).context("--args is not valid JSON")?;
    let tool_args = Arguments::from_json(tool_args).context("--args must be a JSON object")?;

    let mut client = McpClient::spawn(&config.server)?;
    client.initialize("mcp-client")?;

    let tools = client.list_tools().context("failed to list tools")?;
    for tool in &tools {
        println!("tool: {} - {}", tool.name, tool.description);
    }

    match client.call_tool(&args.tool, &tool_args) {
        Ok(result) if result.is_error => println!("{} failed: {}", args.tool, result.joined_text()),
        Ok(result) => println!("{}", result.joined_text()),
        // the prompt demo still runs
        Err(e) => tracing::error!(tool = %args.tool, "failed to call tool: {e:#}"),
    }

    if client.offers_prompts() {
        for prompt in client.list_prompts()?.prompts {
            println!("prompt: {}", prompt.name);
        }
        let prompt = client.get_prompt("prompt_test", &Arguments::new().with("Title", args.title))?;
        for message in prompt.messages {
            if let Some(text) = message.content.text {
                println!("{:?}: {}", message.role, text);
            }
        }
    }

    client.shutdown(Duration::from_secs(2))
}
