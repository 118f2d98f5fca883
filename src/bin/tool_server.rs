//! MCP tool server over stdio.
//!
//! Serves `hello`, `bitcoin_price` and the `prompt_test` prompt (or only
//! `hello` with `--catalog greeter`) until stdin closes.

use anyhow::{Context, Result};
use clap::Parser;
use mcp_gemini::mcp::protocol::Implementation;
use mcp_gemini::mcp::McpServer;
use mcp_gemini::tools::bitcoin_price::{self, PriceClient};
use mcp_gemini::tools::{self, Catalog};
use std::io;

#[derive(Parser)]
#[command(name = "mcp-tool-server")]
#[command(about = "MCP server exposing demo tools over stdio")]
struct Args {
    /// Which tools and prompts to register
    #[arg(long, value_enum, default_value_t = Catalog::Full)]
    catalog: Catalog,

    /// Base URL of the CoinGecko-compatible price API
    #[arg(long, env = "COINGECKO_BASE_URL", default_value = bitcoin_price::DEFAULT_BASE_URL)]
    price_api_url: String,
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

    let prices = PriceClient::new(&args.price_api_url, bitcoin_price::REQUEST_TIMEOUT)
        .context("failed to build HTTP client")?;
    let registry = tools::registry(args.catalog, prices).context("failed to register tools")?;
    tracing::info!(catalog = ?args.catalog, ?registry, "starting MCP server on stdio");

    let server = McpServer::new(&registry, Implementation::this_crate("mcp-tool-server"))
        .with_instructions("Demo tools: greet someone or look up the Bitcoin price.");

    let stdin = io::stdin();
    server.serve(stdin.lock(), io::stdout().lock())
}
