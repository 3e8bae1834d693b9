//! Tool Registry - manages all tool providers
//!
//! Collects tools from all registered providers, validates call arguments
//! against each tool's JSON schema and routes calls to the right provider.

use super::provider::ToolProvider;
use super::ToolError;
use crate::llm::ToolDefinition;
use serde_json::{Map, Number, Value};
use tracing::{debug, info, warn};

/// Registry that manages multiple tool providers
pub struct ToolRegistry {
    providers: Vec<Box<dyn ToolProvider>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a new tool provider
    pub fn register(&mut self, provider: Box<dyn ToolProvider>) {
        debug!(provider = provider.name(), "Registered tool provider");
        self.providers.push(provider);
    }

    /// Get all tools from all registered providers
    #[must_use]
    pub fn all_tools(&self) -> Vec<ToolDefinition> {
        self.providers.iter().flat_map(|p| p.tools()).collect()
    }

    /// Check if any provider can handle the tool
    #[must_use]
    pub fn can_handle(&self, tool_name: &str) -> bool {
        self.providers.iter().any(|p| p.can_handle(tool_name))
    }

    /// Validate the arguments and execute the tool
    ///
    /// # Errors
    ///
    /// Returns a validation error without touching any provider when the tool
    /// is unknown or the arguments don't match its schema, otherwise whatever
    /// the provider returns.
    pub async fn execute(&self, tool_name: &str, arguments: &Value) -> Result<Value, ToolError> {
        let Some(provider) = self.providers.iter().find(|p| p.can_handle(tool_name)) else {
            warn!(tool = tool_name, "No provider found for tool");
            return Err(ToolError::UnknownTool(tool_name.to_string()));
        };

        let definition = provider
            .tools()
            .into_iter()
            .find(|t| t.name == tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let arguments = validate_arguments(&definition, arguments)?;

        info!(
            tool = tool_name,
            provider = provider.name(),
            "Dispatching tool call"
        );
        provider.execute(tool_name, &arguments).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks `arguments` against the tool's parameter schema and returns them
/// normalized: null optionals dropped, numeric strings turned into integers
/// and scalars stringified where a string is declared.
///
/// # Errors
///
/// Returns the first violation found: non-object arguments, then a missing
/// required parameter, then a type mismatch.
pub fn validate_arguments(
    definition: &ToolDefinition,
    arguments: &Value,
) -> Result<Map<String, Value>, ToolError> {
    let tool = definition.name.as_str();
    let mut args = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => {
            return Err(ToolError::InvalidArguments {
                tool: tool.to_string(),
            })
        }
    };

    args.retain(|_, v| !v.is_null());

    let required = definition
        .parameters
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    if let Some(missing) = required.iter().find(|p| !args.contains_key(**p)) {
        return Err(ToolError::MissingArgument {
            tool: tool.to_string(),
            param: (*missing).to_string(),
        });
    }

    let Some(properties) = definition
        .parameters
        .get("properties")
        .and_then(Value::as_object)
    else {
        return Ok(args);
    };

    for (param, value) in &mut args {
        let Some(expected) = properties
            .get(param)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let coerced = coerce(value, expected).ok_or_else(|| ToolError::WrongType {
            tool: tool.to_string(),
            param: param.clone(),
            expected: describe_type(expected).to_string(),
        })?;
        *value = coerced;
    }

    Ok(args)
}

fn coerce(value: &Value, expected: &str) -> Option<Value> {
    match (expected, value) {
        ("integer", Value::Number(n)) => integral(n).map(Value::from),
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        ("number", Value::Number(_))
        | ("boolean", Value::Bool(_))
        | ("object", Value::Object(_))
        | ("array", Value::Array(_))
        | ("string", Value::String(_)) => Some(value.clone()),
        ("string", Value::Number(_) | Value::Bool(_)) => Some(Value::String(value.to_string())),
        ("integer" | "number" | "boolean" | "object" | "array" | "string", _) => None,
        // Unknown schema types are passed through untouched
        _ => Some(value.clone()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
            .map(|f| f as i64)
    })
}

fn describe_type(expected: &str) -> &str {
    match expected {
        "integer" => "an integer",
        "number" => "a number",
        "boolean" => "a boolean",
        "object" => "an object",
        "array" => "an array",
        "string" => "a string",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn update_cell() -> ToolDefinition {
        ToolDefinition {
            name: "update_cell".to_string(),
            description: "Update a specific cell".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sheet_name": {"type": "string"},
                    "row": {"type": "integer"},
                    "column": {"type": "string"},
                    "value": {"type": "string"}
                },
                "required": ["row", "column", "value"]
            }),
        }
    }

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn tools(&self) -> Vec<ToolDefinition> {
            vec![update_cell()]
        }

        fn can_handle(&self, tool_name: &str) -> bool {
            tool_name == "update_cell"
        }

        async fn execute(
            &self,
            _tool_name: &str,
            arguments: &Map<String, Value>,
        ) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Object(arguments.clone()))
        }
    }

    #[test]
    fn test_coerces_integer_and_string() {
        let args = json!({"row": "3", "column": "Status", "value": 42, "sheet_name": null});
        let validated = validate_arguments(&update_cell(), &args)
            .unwrap_or_else(|e| panic!("validation failed: {e}"));
        assert_eq!(validated["row"], json!(3));
        assert_eq!(validated["value"], json!("42"));
        assert!(!validated.contains_key("sheet_name"));
    }

    #[test]
    fn test_float_with_fraction_is_not_integer() {
        let args = json!({"row": 2.5, "column": "A", "value": "x"});
        assert!(matches!(
            validate_arguments(&update_cell(), &args),
            Err(ToolError::WrongType { ref param, .. }) if param == "row"
        ));
        let args = json!({"row": 2.0, "column": "A", "value": "x"});
        assert!(validate_arguments(&update_cell(), &args).is_ok());
    }

    #[test]
    fn test_validation_order() {
        assert!(matches!(
            validate_arguments(&update_cell(), &json!("row=1")),
            Err(ToolError::InvalidArguments { .. })
        ));
        // Missing wins over type errors
        assert!(matches!(
            validate_arguments(&update_cell(), &json!({"row": "x", "column": null, "value": "v"})),
            Err(ToolError::MissingArgument { ref param, .. }) if param == "column"
        ));
        assert!(matches!(
            validate_arguments(&update_cell(), &json!({"row": "x", "column": "A", "value": "v"})),
            Err(ToolError::WrongType { ref expected, .. }) if expected == "an integer"
        ));
    }

    #[tokio::test]
    async fn test_invalid_call_never_reaches_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CountingProvider {
            calls: Arc::clone(&calls),
        }));

        let unknown = registry.execute("drop_table", &json!({})).await;
        assert!(matches!(unknown, Err(ToolError::UnknownTool(_))));

        let missing = registry.execute("update_cell", &json!({"row": 1})).await;
        assert!(matches!(missing, Err(ToolError::MissingArgument { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ok = registry
            .execute("update_cell", &json!({"row": 1, "column": "A", "value": "v"}))
            .await;
        assert!(ok.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
