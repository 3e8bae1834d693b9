//! Tool Provider trait for agent tools
//!
//! Implemented by [`SheetsToolProvider`](super::providers::SheetsToolProvider).

use super::ToolError;
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Unified interface for tool providers
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;

    /// Returns the list of tools this provider offers
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Check if this provider can handle the given tool
    fn can_handle(&self, tool_name: &str) -> bool;

    /// Execute a tool and return its JSON result
    ///
    /// # Arguments
    ///
    /// * `tool_name` - Name of the tool to execute
    /// * `arguments` - Arguments already validated against the tool's schema
    async fn execute(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Value, ToolError>;
}
