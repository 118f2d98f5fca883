//! Orchestrator: bridges model function calls to MCP tools.

pub mod core;

pub use self::core::{
    declare_tools, run, AgentHooks, AgentLoopConfig, ConsoleHooks, Mode, RunReport,
    DEFAULT_MAX_ITERATIONS,
};
