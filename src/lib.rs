//! Bridge between a Gemini function-calling session and an MCP tool server.
//!
//! The crate ships three programs: `mcp-tool-server` serves the demo tools
//! over stdio, `mcp-client` exercises that server directly, and `mcp-gemini`
//! lets a Gemini model call the server's tools.

pub mod agent;
pub mod config;
pub mod gemini;
pub mod logging;
pub mod mcp;
pub mod schema;
pub mod tools;
pub mod value;
