//! Demonstration tools served by `mcp-tool-server`, and client-side dispatch
//! of model function calls to MCP tools.

pub mod bitcoin_price;
pub mod hello;
pub mod mcp_dispatch;

use crate::mcp::registry::{Registry, RegistryError};
use crate::value::ArgumentError;
use bitcoin_price::{BitcoinPrice, PriceClient, PriceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] ArgumentError),
    #[error("Error fetching Bitcoin price: {0}")]
    Price(#[from] PriceError),
}

/// Which set of tools a server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Catalog {
    /// Only the `hello` tool
    Greeter,
    /// `hello`, `bitcoin_price` and the `prompt_test` prompt
    #[default]
    Full,
}

/// Build the registry for a catalog
pub fn registry(catalog: Catalog, prices: PriceClient) -> Result<Registry, RegistryError> {
    let builder = Registry::builder().tool(hello::Hello)?;
    let builder = match catalog {
        Catalog::Greeter => builder,
        Catalog::Full => builder
            .tool(BitcoinPrice::new(prices))?
            .prompt(prompt_test::PromptTest)?,
    };
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn prices() -> PriceClient {
        PriceClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_catalogs() {
        let greeter = registry(Catalog::Greeter, prices()).unwrap();
        let names: Vec<String> = greeter.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["hello"]);
        assert!(!greeter.has_prompts());

        let full = registry(Catalog::Full, prices()).unwrap();
        let names: Vec<String> = full.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["hello", "bitcoin_price"]);
        assert!(full.prompt("prompt_test").is_some());
    }

    #[test]
    fn test_catalog_tools_translate() {
        let full = registry(Catalog::Full, prices()).unwrap();
        for tool in full.tools() {
            assert!(tool.to_function_declaration().is_ok(), "{}", tool.name);
        }
    }
}
