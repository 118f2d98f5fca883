//! MCP client: session setup, discovery and tool invocation over a
//! [`MessageChannel`].

use super::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, Implementation,
    InitializeParams, InitializeResult, ListPromptsResult, ListToolsResult, Request, Response,
    PROTOCOL_VERSION,
};
use super::transport::StdioTransport;
use super::ToolDescriptor;
use crate::config::McpServerConfig;
use crate::value::Arguments;
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// A bidirectional stream of JSON-RPC messages
pub trait MessageChannel {
    fn send(&mut self, message: &Value) -> Result<()>;
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Value>;
}

/// Client half of one MCP session
pub struct McpClient<C: MessageChannel = StdioTransport> {
    channel: C,
    next_id: u64,
    timeout: Duration,
    server_info: Option<InitializeResult>,
}

impl McpClient<StdioTransport> {
    /// Launch the configured server and wrap its stdio in a client
    pub fn spawn(config: &McpServerConfig) -> Result<Self> {
        let transport = StdioTransport::spawn(config)?;
        Ok(Self::new(transport, config.timeout()))
    }

    /// Close the session and reap the server process
    pub fn shutdown(mut self, grace: Duration) -> Result<()> {
        self.channel.shutdown(grace)
    }
}

impl<C: MessageChannel> McpClient<C> {
    pub fn new(channel: C, timeout: Duration) -> Self {
        Self {
            channel,
            next_id: 1,
            timeout,
            server_info: None,
        }
    }

    /// Server identity and capabilities, once initialized
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Perform the initialize handshake, then announce `notifications/initialized`.
    pub fn initialize(&mut self, client_name: &str) -> Result<&InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: Implementation::this_crate(client_name),
        };
        let result: InitializeResult = self
            .request("initialize", &params)
            .context("MCP initialize failed")?;

        if result.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                server = %result.protocol_version,
                client = PROTOCOL_VERSION,
                "protocol version mismatch"
            );
        }
        tracing::info!(
            name = %result.server_info.name,
            version = %result.server_info.version,
            "connected to MCP server"
        );

        self.notify("notifications/initialized")?;
        let info = self.server_info.insert(result);
        Ok(&*info)
    }

    /// Whether the server advertised the prompts capability
    pub fn offers_prompts(&self) -> bool {
        self.server_info
            .as_ref()
            .is_some_and(|info| info.capabilities.prompts.is_some())
    }

    /// Fetch the first page of tools
    pub fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let result: ListToolsResult = self.request("tools/list", &json!({}))?;
        if let Some(cursor) = &result.next_cursor {
            tracing::debug!(%cursor, "ignoring further tool pages");
        }
        Ok(result.tools)
    }

    pub fn call_tool(&mut self, name: &str, arguments: &Arguments) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments: arguments.clone(),
        };
        self.request("tools/call", &params)
            .with_context(|| format!("tools/call {} failed", name))
    }

    pub fn list_prompts(&mut self) -> Result<ListPromptsResult> {
        self.request("prompts/list", &json!({}))
    }

    pub fn get_prompt(&mut self, name: &str, arguments: &Arguments) -> Result<GetPromptResult> {
        let params = GetPromptParams {
            name: name.to_string(),
            arguments: arguments.clone(),
        };
        self.request("prompts/get", &params)
            .with_context(|| format!("prompts/get {} failed", name))
    }

    pub fn ping(&mut self) -> Result<()> {
        let _: Value = self.request("ping", &json!({}))?;
        Ok(())
    }

    fn request<P: Serialize, T: DeserializeOwned>(&mut self, method: &str, params: &P) -> Result<T> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request::new(id, method, serde_json::to_value(params)?);
        self.channel.send(&serde_json::to_value(&request)?)?;

        // unrelated traffic does not extend the wait
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                bail!("no response to {} within {:?}", method, self.timeout);
            }
            let message = self.channel.recv_timeout(remaining)?;
            if message.get("id").and_then(Value::as_u64) != Some(id) {
                // server-initiated traffic or a stale reply
                tracing::debug!(%message, "skipping unrelated message");
                continue;
            }

            let response: Response =
                serde_json::from_value(message).context("malformed JSON-RPC response")?;
            if let Some(error) = response.error {
                return Err(error.into());
            }
            let result = response.result.unwrap_or(Value::Null);
            return serde_json::from_value(result)
                .with_context(|| format!("unexpected {} result shape", method));
        }
    }

    fn notify(&mut self, method: &str) -> Result<()> {
        let notification = Request::notification(method, Value::Null);
        self.channel.send(&serde_json::to_value(&notification)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RpcError;
    use crate::mcp::testing::{self, LoopbackChannel};
    use crate::tools::Catalog;

    #[test]
    fn test_initialize_and_list() {
        let mut client = testing::client(Catalog::Greeter);
        let info = client.initialize("test-client").unwrap();
        assert_eq!(info.protocol_version, PROTOCOL_VERSION);
        assert!(!client.offers_prompts());

        let tools = client.list_tools().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "hello");
    }

    #[test]
    fn test_initialized_notification_sent() {
        let mut client = testing::client(Catalog::Greeter);
        client.initialize("test-client").unwrap();
        let sent = client.channel.sent_methods();
        assert_eq!(sent, vec!["initialize", "notifications/initialized"]);
    }

    #[test]
    fn test_call_tool() {
        let mut client = testing::client(Catalog::Greeter);
        client.initialize("test-client").unwrap();
        let result = client
            .call_tool("hello", &Arguments::new().with("name", "World!"))
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "Hello World!");
    }

    #[test]
    fn test_rpc_error_surfaces() {
        let mut client = testing::client(Catalog::Greeter);
        client.initialize("test-client").unwrap();
        let err = client.call_tool("nope", &Arguments::new()).unwrap_err();
        let rpc = err.downcast_ref::<RpcError>().unwrap();
        assert_eq!(rpc.code, crate::mcp::protocol::INVALID_PARAMS);
    }

    #[test]
    fn test_prompts() {
        let mut client = testing::client(Catalog::Full);
        client.initialize("test-client").unwrap();
        assert!(client.offers_prompts());

        let prompts = client.list_prompts().unwrap();
        assert_eq!(prompts.prompts[0].name, "prompt_test");

        let result = client
            .get_prompt("prompt_test", &Arguments::new().with("Title", "Hello MCP"))
            .unwrap();
        assert_eq!(result.messages[0].content.text.as_deref(), Some("Hello, Hello MCP!"));
        client.ping().unwrap();
    }

    #[test]
    fn test_skips_unrelated_messages() {
        let mut channel = LoopbackChannel::new(Catalog::Greeter);
        channel.inject(json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}));
        channel.inject(json!({"jsonrpc": "2.0", "id": 99, "result": {}}));
        let mut client = McpClient::new(channel, Duration::from_secs(1));
        client.ping().unwrap();
    }

    /// Answers every receive with a notification after a short pause
    struct ChattyChannel {
        waits: Vec<Duration>,
    }

    impl MessageChannel for ChattyChannel {
        fn send(&mut self, _message: &Value) -> Result<()> {
            Ok(())
        }

        fn recv_timeout(&mut self, timeout: Duration) -> Result<Value> {
            self.waits.push(timeout);
            std::thread::sleep(Duration::from_millis(20).min(timeout));
            Ok(json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}}))
        }
    }

    #[test]
    fn test_unrelated_traffic_does_not_extend_timeout() {
        let timeout = Duration::from_millis(100);
        let mut client = McpClient::new(ChattyChannel { waits: Vec::new() }, timeout);

        let started = Instant::now();
        let err = client.ping().unwrap_err();

        assert!(err.to_string().contains("no response to ping"));
        assert!(started.elapsed() < Duration::from_secs(1));
        let waits = &client.channel.waits;
        assert!(waits.len() > 1);
        assert!(waits.iter().all(|w| *w <= timeout));
        assert!(waits.windows(2).all(|w| w[1] < w[0]));
    }
}
