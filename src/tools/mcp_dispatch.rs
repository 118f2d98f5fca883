//! MCP tool dispatch - routes a model function call to the MCP server.

use crate::mcp::{McpClient, MessageChannel, ToolOutcome};
use crate::value::Arguments;

/// Execute one tool call. Transport and protocol failures become a
/// [`ToolOutcome::Failure`] so the model can see them.
pub fn execute<C: MessageChannel>(
    client: &mut McpClient<C>,
    name: &str,
    args: &Arguments,
) -> ToolOutcome {
    match client.call_tool(name, args) {
        Ok(result) => {
            let outcome = ToolOutcome::from(result);
            if let ToolOutcome::Failure(message) = &outcome {
                tracing::warn!(tool = name, %message, "tool reported an error");
            }
            outcome
        }
        Err(e) => {
            tracing::warn!(tool = name, error = %format!("{e:#}"), "tool call failed");
            ToolOutcome::Failure(format!("{e:#}"))
        }
    }
}
