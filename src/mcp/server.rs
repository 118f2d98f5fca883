//! MCP server loop over newline-delimited JSON-RPC.

use super::protocol::{
    self, CallToolParams, CallToolResult, GetPromptParams, Implementation, InitializeResult,
    ListChanged, ListPromptsResult, ListToolsResult, Request, Response, RpcError,
    ServerCapabilities,
};
use super::registry::Registry;
use crate::schema;
use crate::tools::ToolError;
use crate::value::{ArgValue, ArgumentError, Arguments};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::{BufRead, Write};

/// Serves a borrowed [`Registry`] to a single client
pub struct McpServer<'r> {
    registry: &'r Registry,
    info: Implementation,
    instructions: Option<String>,
}

impl<'r> McpServer<'r> {
    pub fn new(registry: &'r Registry, info: Implementation) -> Self {
        Self {
            registry,
            info,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Read requests line by line until EOF, writing one response line per request.
    ///
    /// Lines are taken as raw bytes, so invalid UTF-8 earns a parse error
    /// reply instead of ending the session.
    pub fn serve<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> Result<()> {
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .context("Failed to read from client")?;
            if n == 0 {
                break;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if let Some(resp) = self.handle_line(&line) {
                let json = serde_json::to_string(&resp)?;
                writeln!(writer, "{}", json).context("Failed to write response")?;
                writer.flush().context("Failed to flush response")?;
            }
        }
        tracing::info!("client closed the channel, shutting down");
        Ok(())
    }

    /// Handle one raw line. Returns `None` for notifications.
    pub fn handle_line(&self, line: &[u8]) -> Option<Response> {
        match serde_json::from_slice::<Value>(line) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                tracing::warn!(error = %e, "unparsable message from client");
                Some(Response::failure(
                    Value::Null,
                    RpcError::new(protocol::PARSE_ERROR, format!("Parse error: {}", e)),
                ))
            }
        }
    }

    pub fn handle_message(&self, message: Value) -> Option<Response> {
        let id_hint = message.get("id").cloned().unwrap_or(Value::Null);
        let request: Request = match serde_json::from_value(message) {
            Ok(req) => req,
            Err(e) => {
                return Some(Response::failure(
                    id_hint,
                    RpcError::new(protocol::INVALID_REQUEST, format!("Invalid request: {}", e)),
                ))
            }
        };

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        tracing::debug!(method = %request.method, "request");
        Some(match self.dispatch(&request.method, request.params) {
            Ok(result) => Response::success(id, result),
            Err(error) => {
                tracing::debug!(method = %request.method, code = error.code, "request failed: {}", error.message);
                Response::failure(id, error)
            }
        })
    }

    fn handle_notification(&self, request: &Request) {
        match request.method.as_str() {
            "notifications/initialized" => tracing::info!("client initialized"),
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => to_value(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => to_value(ListToolsResult {
                tools: self.registry.tools(),
                next_cursor: None,
            }),
            "tools/call" => self.call_tool(parse_params(params)?),
            "prompts/list" => to_value(ListPromptsResult {
                prompts: self.registry.prompts(),
                next_cursor: None,
            }),
            "prompts/get" => self.get_prompt(parse_params(params)?),
            other => Err(RpcError::new(
                protocol::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: protocol::PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ListChanged::default()),
                prompts: self.registry.has_prompts().then(ListChanged::default),
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        }
    }

    fn call_tool(&self, params: CallToolParams) -> Result<Value, RpcError> {
        let tool = self
            .registry
            .tool(&params.name)
            .ok_or_else(|| RpcError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        check_arguments(&tool.input_schema(), &params.arguments)
            .map_err(|e| RpcError::invalid_params(e.to_string()))?;

        tracing::info!(tool = %params.name, "tool call");
        let result = match tool.call(&params.arguments) {
            Ok(text) => CallToolResult::text(text),
            Err(ToolError::InvalidArguments(e)) => return Err(RpcError::invalid_params(e.to_string())),
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "tool failed");
                CallToolResult::error(e.to_string())
            }
        };
        to_value(result)
    }

    fn get_prompt(&self, params: GetPromptParams) -> Result<Value, RpcError> {
        let prompt = self
            .registry
            .prompt(&params.name)
            .ok_or_else(|| RpcError::invalid_params(format!("Unknown prompt: {}", params.name)))?;

        for arg in prompt.descriptor().arguments.iter().filter(|a| a.required) {
            if matches!(params.arguments.get(&arg.name), None | Some(ArgValue::Null)) {
                return Err(RpcError::invalid_params(
                    ArgumentError::Missing(arg.name.clone()).to_string(),
                ));
            }
        }

        tracing::info!(prompt = %params.name, "prompt request");
        let rendered = prompt
            .render(&params.arguments)
            .map_err(|e| RpcError::invalid_params(e.to_string()))?;
        to_value(rendered)
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(protocol::INTERNAL_ERROR, e.to_string()))
}

/// Check required properties and top-level property types against an input schema.
fn check_arguments(schema: &Value, args: &Arguments) -> Result<(), ArgumentError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if matches!(args.get(key), None | Some(ArgValue::Null)) {
                return Err(ArgumentError::Missing(key.to_string()));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in args.iter() {
        let Some(expected) = properties
            .get(key)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .and_then(|tag| schema::map_type(tag).ok())
        else {
            continue;
        };
        let expected = schema::json_type(expected);
        let matches = match (expected, value) {
            (_, ArgValue::Null) => true,
            ("string", ArgValue::String(_)) => true,
            ("boolean", ArgValue::Bool(_)) => true,
            ("number", ArgValue::Number(_)) => true,
            ("integer", ArgValue::Number(n)) => n.is_i64() || n.is_u64(),
            ("array", ArgValue::List(_)) => true,
            ("object", ArgValue::Map(_)) => true,
            _ => false,
        };
        if !matches {
            return Err(ArgumentError::WrongType {
                key: key.clone(),
                expected,
                found: value.kind(),
            });
        }
    }
    Ok(())
}
