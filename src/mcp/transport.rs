//! Stdio transport layer for MCP server communication.
//!
//! Spawns the tool server as a subprocess and exchanges newline-delimited
//! JSON over its stdin/stdout. The server's stderr is inherited so its logs
//! reach the terminal.

use super::client::MessageChannel;
use crate::config::McpServerConfig;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Stdio transport for communicating with an MCP server subprocess
pub struct StdioTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    response_rx: Receiver<Value>,
    reader_handle: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Spawn the configured server and start reading its stdout
    pub fn spawn(config: &McpServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn MCP server: {}", config.command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("MCP server stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("MCP server stdout was not captured"))?;

        tracing::debug!(pid = child.id(), command = %config.command, "spawned MCP server");

        let (tx, rx) = mpsc::channel();
        let reader_handle = thread::spawn(move || {
            Self::reader_loop(stdout, tx);
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            response_rx: rx,
            reader_handle: Some(reader_handle),
        })
    }

    fn reader_loop(stdout: ChildStdout, tx: Sender<Value>) {
        let mut reader = BufReader::new(stdout);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break, // pipe closed
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "reading MCP server stdout failed");
                    break;
                }
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice(&line) {
                Ok(msg) => {
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        line = %String::from_utf8_lossy(&line).trim_end(),
                        "unparseable line from MCP server"
                    );
                }
            }
        }
    }

    /// Send one JSON-RPC message
    pub fn send(&mut self, message: &Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("MCP server stdin is closed"))?;
        let json = serde_json::to_string(message)?;
        writeln!(stdin, "{}", json).context("failed to write to MCP server stdin")?;
        stdin.flush().context("failed to flush MCP server stdin")?;
        Ok(())
    }

    /// Receive the next message, waiting at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Value> {
        self.response_rx.recv_timeout(timeout).map_err(|e| match e {
            mpsc::RecvTimeoutError::Timeout => {
                anyhow!("no response from MCP server within {:?}", timeout)
            }
            mpsc::RecvTimeoutError::Disconnected => anyhow!("MCP server closed its stdout"),
        })
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit code if the process has exited
    pub fn exit_status(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    /// Close stdin and give the server `grace` to exit on its own before
    /// killing it.
    pub fn shutdown(&mut self, grace: Duration) -> Result<()> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait_timeout(grace)
            .context("failed to wait for MCP server")?;
        match status {
            Some(status) => tracing::debug!(?status, "MCP server exited"),
            None => {
                tracing::warn!(pid = self.pid(), "MCP server did not exit in time, killing");
                self.kill()?;
            }
        }
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    pub fn kill(&mut self) -> Result<()> {
        self.child.kill().context("failed to kill MCP server")?;
        self.child.wait().context("failed to wait for MCP server")?;
        Ok(())
    }
}

impl MessageChannel for StdioTransport {
    fn send(&mut self, message: &Value) -> Result<()> {
        StdioTransport::send(self, message)
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Value> {
        StdioTransport::recv_timeout(self, timeout)
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();

        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn shell(script: &str) -> McpServerConfig {
        McpServerConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            ..McpServerConfig::default()
        }
    }

    #[test]
    fn test_echo_round_trip() {
        let mut transport = StdioTransport::spawn(&shell("cat")).unwrap();
        assert!(transport.is_alive());

        transport.send(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).unwrap();
        let msg = transport.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(msg["method"], "ping");

        transport.shutdown(Duration::from_secs(5)).unwrap();
        assert_eq!(transport.exit_status(), Some(0));
    }

    #[test]
    fn test_skips_garbage_lines() {
        let mut transport =
            StdioTransport::spawn(&shell("echo 'not json'; echo '{\"ok\":true}'; cat")).unwrap();
        let msg = transport.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(msg, json!({"ok": true}));
        transport.shutdown(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_skips_invalid_utf8_lines() {
        let mut transport =
            StdioTransport::spawn(&shell("printf '\\377\\n'; echo '{\"ok\":true}'; cat")).unwrap();
        let msg = transport.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(msg, json!({"ok": true}));
        assert!(transport.is_alive());
        transport.shutdown(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_recv_times_out() {
        let transport = StdioTransport::spawn(&shell("cat")).unwrap();
        let err = transport.recv_timeout(Duration::from_millis(50)).unwrap_err();
        assert!(err.to_string().contains("no response"));
    }

    #[test]
    fn test_spawn_failure() {
        let config = McpServerConfig {
            command: "/nonexistent/mcp-server".to_string(),
            ..McpServerConfig::default()
        };
        let err = StdioTransport::spawn(&config).err().unwrap();
        assert!(err.to_string().contains("failed to spawn MCP server"));
    }
}
