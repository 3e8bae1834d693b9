//! Tool bridge module
//!
//! Runs the tool calls of one model response, each under a timeout, and
//! pairs every call with a tool-role turn in the transcript.

use super::registry::ToolRegistry;
use super::ToolError;
use crate::llm::{Message, ToolCall};
use serde_json::json;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

/// Execute tool calls sequentially in the order given.
///
/// Every call yields exactly one tool turn carrying its call id, whether it
/// succeeded, failed validation, errored or timed out. Returns how many
/// calls were processed.
pub async fn execute_tool_calls(
    tool_calls: Vec<ToolCall>,
    registry: &ToolRegistry,
    tool_timeout: Duration,
    transcript: &mut Vec<Message>,
) -> usize {
    let count = tool_calls.len();
    for call in tool_calls {
        let output = execute_single_tool_call(&call, registry, tool_timeout).await;
        transcript.push(Message::tool(&call.id, &call.name, &output));
    }
    count
}

/// Execute one call and render its result as the JSON text the model sees.
pub async fn execute_single_tool_call(
    call: &ToolCall,
    registry: &ToolRegistry,
    tool_timeout: Duration,
) -> String {
    info!(
        tool = %call.name,
        tool_args = %crate::utils::truncate_str(call.arguments_json(), 200),
        "Executing tool call"
    );
    let started = Instant::now();

    let result = match timeout(tool_timeout, registry.execute(&call.name, &call.arguments)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                tool = %call.name,
                timeout_ms = tool_timeout.as_millis(),
                "Tool execution timed out"
            );
            Err(ToolError::Timeout {
                tool: call.name.clone(),
                ms: tool_timeout.as_millis(),
            })
        }
    };

    let duration_ms = started.elapsed().as_millis();
    match result {
        Ok(value) => {
            info!(tool = %call.name, duration_ms, "Tool call succeeded");
            value.to_string()
        }
        Err(e) => {
            warn!(tool = %call.name, duration_ms, error = %e, "Tool call failed");
            json!({"error": e.to_string()}).to_string()
        }
    }
}
