//! MCP (Model Context Protocol) client and server over stdio.

pub mod client;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{McpClient, MessageChannel};
pub use registry::{PromptHandler, Registry, ToolHandler};
pub use server::McpServer;
pub use transport::StdioTransport;

use crate::gemini::FunctionDeclaration;
use crate::schema::{self, SchemaError};
use protocol::CallToolResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tool definition as listed by an MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name, unique within one server (e.g., "hello")
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for tool input parameters
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Build the Gemini function declaration for this tool
    pub fn to_function_declaration(&self) -> Result<FunctionDeclaration, SchemaError> {
        Ok(FunctionDeclaration {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: Some(schema::translate_input_schema(&self.input_schema)?),
        })
    }
}

/// Outcome of one tool invocation, as handed back to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success(String),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// Function-response payload: `{"response": ...}` or `{"error": ...}`
    pub fn to_function_response(&self) -> Value {
        match self {
            ToolOutcome::Success(text) => json!({ "response": text }),
            ToolOutcome::Failure(message) => json!({ "error": message }),
        }
    }
}

impl From<CallToolResult> for ToolOutcome {
    fn from(result: CallToolResult) -> Self {
        let text = result.joined_text();
        if result.is_error {
            ToolOutcome::Failure(text)
        } else {
            ToolOutcome::Success(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::Type;

    #[test]
    fn test_descriptor_wire_names() {
        let tool: ToolDescriptor = serde_json::from_value(json!({
            "name": "hello",
            "description": "Say hello to a person",
            "inputSchema": {
                "type": "object",
                "properties": {"name": {"type": "string", "description": "The name to say hello to"}},
                "required": ["name"]
            }
        }))
        .unwrap();

        let decl = tool.to_function_declaration().unwrap();
        assert_eq!(decl.name, "hello");
        assert_eq!(decl.description, "Say hello to a person");
        let params = decl.parameters.unwrap();
        assert_eq!(params.schema_type, Type::Object);
        assert_eq!(params.properties["name"].schema_type, Type::String);
    }

    #[test]
    fn test_outcome_function_response() {
        let ok = ToolOutcome::from(CallToolResult::text("Hello World!"));
        assert_eq!(ok.to_function_response(), json!({"response": "Hello World!"}));

        let failed = ToolOutcome::from(CallToolResult::error("unsupported currency: XYZ"));
        assert!(!failed.is_success());
        assert_eq!(
            failed.to_function_response(),
            json!({"error": "unsupported currency: XYZ"})
        );
    }
}
