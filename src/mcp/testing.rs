//! In-process channel that answers requests with an [`McpServer`].

use super::client::{McpClient, MessageChannel};
use super::protocol::Implementation;
use super::registry::Registry;
use super::server::McpServer;
use crate::tools::bitcoin_price::PriceClient;
use crate::tools::{self, Catalog};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

pub(crate) struct LoopbackChannel {
    registry: Registry,
    inbox: VecDeque<Value>,
    sent: Vec<Value>,
}

impl LoopbackChannel {
    pub(crate) fn new(catalog: Catalog) -> Self {
        // nothing listens on the discard port, so price lookups fail fast
        let prices = PriceClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        Self::with_registry(tools::registry(catalog, prices).unwrap())
    }

    pub(crate) fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            inbox: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Queue a message as if the server had sent it unprompted
    pub(crate) fn inject(&mut self, message: Value) {
        self.inbox.push_back(message);
    }

    pub(crate) fn sent_methods(&self) -> Vec<String> {
        self.sent
            .iter()
            .filter_map(|m| m.get("method").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

impl MessageChannel for LoopbackChannel {
    fn send(&mut self, message: &Value) -> Result<()> {
        self.sent.push(message.clone());
        let server = McpServer::new(&self.registry, Implementation::this_crate("loopback"));
        if let Some(response) = server.handle_message(message.clone()) {
            self.inbox.push_back(serde_json::to_value(response)?);
        }
        Ok(())
    }

    fn recv_timeout(&mut self, _timeout: Duration) -> Result<Value> {
        self.inbox
            .pop_front()
            .ok_or_else(|| anyhow!("loopback inbox is empty"))
    }
}

pub(crate) fn client(catalog: Catalog) -> McpClient<LoopbackChannel> {
    McpClient::new(LoopbackChannel::new(catalog), Duration::from_secs(1))
}
