//! Agent runner module.
//!
//! The tool-calling loop for one user turn, independent of chat and session
//! concerns.

use super::registry::ToolRegistry;
use super::tool_bridge::execute_tool_calls;
use crate::config::{
    AGENT_MAX_ITERATIONS, EMPTY_REPLY_FALLBACK, ITERATION_CAP_FALLBACK, TOOL_TIMEOUT_SECS,
};
use crate::llm::{LlmError, LlmProvider, LlmResponse, Message};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Limits for one turn
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum adapter calls per turn
    pub max_iterations: usize,
    /// Timeout for each tool execution
    pub tool_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: AGENT_MAX_ITERATIONS,
            tool_timeout: Duration::from_secs(TOOL_TIMEOUT_SECS),
        }
    }
}

/// What a turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Reply for the user
    pub text: String,
    /// Adapter calls made
    pub llm_calls: usize,
    /// Tool calls processed
    pub tool_executions: usize,
    /// The turn ended on the iteration cap
    pub hit_iteration_cap: bool,
}

/// Drive one turn to a final answer.
///
/// `transcript` holds the prior conversation plus the new user message.
/// Assistant tool-call turns and their tool results are appended to it as
/// the loop runs.
///
/// # Errors
///
/// Adapter failures propagate unchanged. Tool failures never do: they are
/// fed back to the model as error results.
pub async fn run_turn(
    llm: &dyn LlmProvider,
    system_prompt: &str,
    transcript: &mut Vec<Message>,
    registry: &ToolRegistry,
    config: &RunnerConfig,
) -> Result<TurnOutcome, LlmError> {
    let tools = registry.all_tools();
    let mut tool_executions = 0;

    for iteration in 1..=config.max_iterations {
        let started = Instant::now();
        let response = llm.generate(system_prompt, transcript, &tools).await?;
        debug!(
            iteration,
            provider = llm.name(),
            duration_ms = started.elapsed().as_millis(),
            "Model responded"
        );

        match response {
            LlmResponse::FinalMessage(text) => {
                info!(iteration, tool_executions, "Turn complete");
                let text = if text.trim().is_empty() {
                    EMPTY_REPLY_FALLBACK.to_string()
                } else {
                    text
                };
                return Ok(TurnOutcome {
                    text,
                    llm_calls: iteration,
                    tool_executions,
                    hit_iteration_cap: false,
                });
            }
            LlmResponse::ToolCalls(calls) if iteration == config.max_iterations => {
                warn!(
                    iteration,
                    pending = calls.len(),
                    "Iteration cap reached with tool calls pending"
                );
            }
            LlmResponse::ToolCalls(calls) => {
                debug!(iteration, count = calls.len(), "Model requested tools");
                transcript.push(Message::assistant_with_tools("", calls.clone()));
                tool_executions +=
                    execute_tool_calls(calls, registry, config.tool_timeout, transcript).await;
            }
        }
    }

    Ok(TurnOutcome {
        text: ITERATION_CAP_FALLBACK.to_string(),
        llm_calls: config.max_iterations,
        tool_executions,
        hit_iteration_cap: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmProvider, ToolCall};
    use serde_json::json;

    fn config(max_iterations: usize) -> RunnerConfig {
        RunnerConfig {
            max_iterations,
            tool_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_final_message_needs_one_call() {
        let mut llm = MockLlmProvider::new();
        llm.expect_name().return_const("mock");
        llm.expect_generate()
            .times(1)
            .returning(|_, _, _| Ok(LlmResponse::FinalMessage("Hi!".to_string())));

        let mut transcript = vec![Message::user("hello")];
        let outcome = run_turn(&llm, "sys", &mut transcript, &ToolRegistry::new(), &config(5))
            .await
            .unwrap_or_else(|e| panic!("turn failed: {e}"));

        assert_eq!(outcome.text, "Hi!");
        assert_eq!((outcome.llm_calls, outcome.tool_executions), (1, 0));
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_becomes_done() {
        let mut llm = MockLlmProvider::new();
        llm.expect_name().return_const("mock");
        llm.expect_generate()
            .returning(|_, _, _| Ok(LlmResponse::FinalMessage("  ".to_string())));

        let mut transcript = vec![Message::user("add it")];
        let outcome = run_turn(&llm, "sys", &mut transcript, &ToolRegistry::new(), &config(5))
            .await
            .unwrap_or_else(|e| panic!("turn failed: {e}"));
        assert_eq!(outcome.text, "Done!");
    }

    #[tokio::test]
    async fn test_cap_stops_without_running_last_calls() {
        let mut llm = MockLlmProvider::new();
        llm.expect_name().return_const("mock");
        llm.expect_generate().times(2).returning(|_, _, _| {
            Ok(LlmResponse::ToolCalls(vec![ToolCall::new(
                "c",
                "missing_tool",
                json!({}),
            )]))
        });

        let mut transcript = vec![Message::user("loop")];
        let outcome = run_turn(&llm, "sys", &mut transcript, &ToolRegistry::new(), &config(2))
            .await
            .unwrap_or_else(|e| panic!("turn failed: {e}"));

        assert!(outcome.hit_iteration_cap);
        assert_eq!(outcome.text, ITERATION_CAP_FALLBACK);
        assert_eq!((outcome.llm_calls, outcome.tool_executions), (2, 1));
        // user, assistant with calls, tool result
        assert_eq!(transcript.len(), 3);
        assert!(transcript[2].content.contains("Unknown tool: missing_tool"));
    }

    #[tokio::test]
    async fn test_adapter_error_propagates() {
        let mut llm = MockLlmProvider::new();
        llm.expect_name().return_const("mock");
        llm.expect_generate()
            .times(1)
            .returning(|_, _, _| Err(LlmError::NetworkError("connection reset".to_string())));

        let mut transcript = vec![Message::user("hello")];
        let result =
            run_turn(&llm, "sys", &mut transcript, &ToolRegistry::new(), &config(5)).await;
        assert!(matches!(result, Err(LlmError::NetworkError(_))));
    }
}
