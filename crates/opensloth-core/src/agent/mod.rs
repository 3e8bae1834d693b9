//! Agent module for spreadsheet conversations
//!
//! This module provides:
//! - A registry of tools the model may call, with argument validation
//! - The tool-calling loop that drives one user turn
//! - Per-chat conversation history and session locking
//! - The system prompt and the high-level [`SheetAgent`] entry point

/// High-level entry point used by transports
pub mod executor;
/// Bounded per-chat conversation history
pub mod memory;
/// System prompt composition
pub mod prompt;
/// Tool provider trait
pub mod provider;
/// Built-in tool providers
pub mod providers;
/// Registry for managing available tools
pub mod registry;
/// Core agent runner (execution loop)
pub mod runner;
/// Per-chat session state and locking
pub mod session_registry;
/// Tool execution bridge with timeout
pub mod tool_bridge;

pub use executor::{AgentOptions, SheetAgent, UserContext};
pub use memory::ConversationHistory;
pub use provider::ToolProvider;
pub use providers::{sheet_tools, SheetTarget, SheetsToolProvider};
pub use registry::ToolRegistry;
pub use runner::{run_turn, RunnerConfig, TurnOutcome};
pub use session_registry::{ChatSession, SessionRegistry};

use crate::llm::LlmError;
use crate::sheets::SheetsError;
use thiserror::Error;

/// Reasons a tool call fails. Serialized into the tool turn as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No provider offers the tool
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments were not a JSON object
    #[error("Arguments for '{tool}' must be a JSON object")]
    InvalidArguments {
        /// Tool name
        tool: String,
    },
    /// A required parameter is absent or null
    #[error("Missing required argument '{param}' for '{tool}'")]
    MissingArgument {
        /// Tool name
        tool: String,
        /// Parameter name
        param: String,
    },
    /// A parameter has the wrong JSON type
    #[error("Argument '{param}' for '{tool}' must be {expected}")]
    WrongType {
        /// Tool name
        tool: String,
        /// Parameter name
        param: String,
        /// Declared type
        expected: String,
    },
    /// Execution exceeded the tool timeout
    #[error("Tool '{tool}' timed out after {ms} ms")]
    Timeout {
        /// Tool name
        tool: String,
        /// Timeout that elapsed, in milliseconds
        ms: u128,
    },
    /// The spreadsheet operation failed
    #[error(transparent)]
    Sheets(#[from] SheetsError),
}

/// Failure of a whole turn
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model provider could not be reached or answered unusably
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}
