//! Spreadsheet tools
//!
//! Every tool that touches data works against the [`SheetTarget`] of the
//! current turn. `open_sheet` retargets it.

use crate::agent::provider::ToolProvider;
use crate::agent::ToolError;
use crate::llm::ToolDefinition;
use crate::sheets::{extract_spreadsheet_id, SearchQuery, SheetsApi, SheetsError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;
use tracing::{debug, info};

const SHEET_NAME_DESCRIPTION: &str = "Worksheet name. Omit for first sheet.";

static SHEET_TOOLS: LazyLock<Vec<ToolDefinition>> = LazyLock::new(build_catalog);

fn tool(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn no_params() -> Value {
    json!({"type": "object", "properties": {}})
}

fn build_catalog() -> Vec<ToolDefinition> {
    let mut tools = navigation_tools();
    tools.extend(row_tools());
    tools
}

fn navigation_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "list_my_sheets",
            "List all Google Sheets shared with the bot",
            no_params(),
        ),
        tool(
            "open_sheet",
            "Open a Google Sheet by URL or ID to work with it",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Google Sheets URL or sheet ID"}
                },
                "required": ["url"]
            }),
        ),
        tool(
            "get_active_sheet",
            "Get info about the currently active sheet",
            no_params(),
        ),
        tool(
            "list_sheets",
            "List all worksheets/tabs in the active spreadsheet",
            no_params(),
        ),
        tool(
            "read_sheet",
            "Read all data from a worksheet",
            json!({
                "type": "object",
                "properties": {
                    "sheet_name": {"type": "string", "description": SHEET_NAME_DESCRIPTION}
                }
            }),
        ),
    ]
}

fn row_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "add_row",
            "Add a new row to a worksheet",
            json!({
                "type": "object",
                "properties": {
                    "sheet_name": {"type": "string", "description": SHEET_NAME_DESCRIPTION},
                    "data": {
                        "type": "object",
                        "description": "Column name to value mapping",
                        "additionalProperties": {"type": "string"}
                    }
                },
                "required": ["data"]
            }),
        ),
        tool(
            "update_cell",
            "Update a specific cell",
            json!({
                "type": "object",
                "properties": {
                    "sheet_name": {"type": "string", "description": SHEET_NAME_DESCRIPTION},
                    "row": {"type": "integer", "description": "Row number (1-indexed, excluding header)"},
                    "column": {"type": "string", "description": "Column name"},
                    "value": {"type": "string", "description": "New value"}
                },
                "required": ["row", "column", "value"]
            }),
        ),
        tool(
            "update_row",
            "Update several columns of one row at once",
            json!({
                "type": "object",
                "properties": {
                    "sheet_name": {"type": "string", "description": SHEET_NAME_DESCRIPTION},
                    "row": {"type": "integer", "description": "Row number (1-indexed, excluding header)"},
                    "data": {
                        "type": "object",
                        "description": "Column name to new value mapping",
                        "additionalProperties": {"type": "string"}
                    }
                },
                "required": ["row", "data"]
            }),
        ),
        tool(
            "delete_row",
            "Delete a row from a worksheet",
            json!({
                "type": "object",
                "properties": {
                    "sheet_name": {"type": "string", "description": SHEET_NAME_DESCRIPTION},
                    "row": {"type": "integer", "description": "Row number to delete (1-indexed, excluding header)"}
                },
                "required": ["row"]
            }),
        ),
        tool(
            "search",
            "Search for text across all worksheets in the active sheet",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text to search for"},
                    "column": {"type": "string", "description": "Only match this column"},
                    "sheet_name": {"type": "string", "description": "Only search this worksheet"}
                },
                "required": ["query"]
            }),
        ),
    ]
}

/// The static spreadsheet tool catalog.
#[must_use]
pub fn sheet_tools() -> &'static [ToolDefinition] {
    &SHEET_TOOLS
}

/// Spreadsheet a turn operates on
#[derive(Debug, Default)]
pub struct SheetTarget {
    opened: RwLock<Option<String>>,
    fallback: Option<String>,
}

impl SheetTarget {
    /// Target the chat's opened spreadsheet, else the configured default.
    #[must_use]
    pub fn new(opened: Option<String>, fallback: Option<String>) -> Self {
        Self {
            opened: RwLock::new(opened),
            fallback,
        }
    }

    /// Spreadsheet id tools should use, if any
    pub async fn current(&self) -> Option<String> {
        self.opened
            .read()
            .await
            .clone()
            .or_else(|| self.fallback.clone())
    }

    /// Spreadsheet explicitly opened in this chat
    pub async fn opened(&self) -> Option<String> {
        self.opened.read().await.clone()
    }

    async fn open(&self, spreadsheet_id: String) {
        *self.opened.write().await = Some(spreadsheet_id);
    }

    async fn require(&self) -> Result<String, ToolError> {
        self.current()
            .await
            .ok_or(ToolError::Sheets(SheetsError::NoSpreadsheet))
    }
}

#[derive(Debug, Deserialize)]
struct OpenSheetArgs {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SheetArgs {
    sheet_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddRowArgs {
    sheet_name: Option<String>,
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateCellArgs {
    sheet_name: Option<String>,
    row: i64,
    column: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct UpdateRowArgs {
    sheet_name: Option<String>,
    row: i64,
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DeleteRowArgs {
    sheet_name: Option<String>,
    row: i64,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    column: Option<String>,
    sheet_name: Option<String>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments.clone())).map_err(|e| {
        debug!(tool, error = %e, "Argument decoding failed");
        ToolError::InvalidArguments {
            tool: tool.to_string(),
        }
    })
}

/// Negative rows become 0 so the client reports them as out of range
fn row_index(row: i64) -> usize {
    usize::try_from(row).unwrap_or(0)
}

fn to_json(value: impl Serialize) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Sheets(SheetsError::Json(e.to_string())))
}

/// `{"success": true, ...outcome}`
fn success(outcome: impl Serialize) -> Result<Value, ToolError> {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    match to_json(outcome)? {
        Value::Object(fields) => body.extend(fields),
        other => {
            body.insert("result".to_string(), other);
        }
    }
    Ok(Value::Object(body))
}

/// Provider for the spreadsheet tools
pub struct SheetsToolProvider {
    sheets: Arc<dyn SheetsApi>,
    target: Arc<SheetTarget>,
}

impl SheetsToolProvider {
    /// Create a provider bound to one turn's target
    #[must_use]
    pub fn new(sheets: Arc<dyn SheetsApi>, target: Arc<SheetTarget>) -> Self {
        Self { sheets, target }
    }

    async fn list_my_sheets(&self) -> Result<Value, ToolError> {
        let sheets = self.sheets.list_spreadsheets().await?;
        Ok(json!({"count": sheets.len(), "sheets": sheets}))
    }

    async fn open_sheet(&self, args: OpenSheetArgs) -> Result<Value, ToolError> {
        let spreadsheet_id = extract_spreadsheet_id(&args.url);
        if spreadsheet_id.is_empty() {
            return Err(ToolError::MissingArgument {
                tool: "open_sheet".to_string(),
                param: "url".to_string(),
            });
        }
        let info = self.sheets.spreadsheet_info(&spreadsheet_id).await?;
        self.target.open(spreadsheet_id).await;
        info!(spreadsheet = %info.id, title = %info.title, "Opened spreadsheet");
        Ok(json!({"success": true, "sheet": info}))
    }

    async fn get_active_sheet(&self) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let info = self.sheets.spreadsheet_info(&id).await?;
        Ok(json!({"active_sheet": info}))
    }

    async fn list_sheets(&self) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let info = self.sheets.spreadsheet_info(&id).await?;
        Ok(json!({"sheets": info.worksheets}))
    }

    async fn read_sheet(&self, args: SheetArgs) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let table = self
            .sheets
            .read_rows(&id, args.sheet_name.as_deref())
            .await?;
        Ok(json!({
            "sheet": table.sheet,
            "headers": table.headers,
            "count": table.rows.len(),
            "rows": table.rows,
        }))
    }

    async fn add_row(&self, args: AddRowArgs) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let outcome = self
            .sheets
            .append_row(&id, args.sheet_name.as_deref(), &args.data)
            .await?;
        success(outcome)
    }

    async fn update_cell(&self, args: UpdateCellArgs) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let mut data = Map::new();
        data.insert(args.column, Value::String(args.value));
        let outcome = self
            .sheets
            .update_row(&id, args.sheet_name.as_deref(), row_index(args.row), &data)
            .await?;
        success(outcome)
    }

    async fn update_row(&self, args: UpdateRowArgs) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let outcome = self
            .sheets
            .update_row(&id, args.sheet_name.as_deref(), row_index(args.row), &args.data)
            .await?;
        success(outcome)
    }

    async fn delete_row(&self, args: DeleteRowArgs) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let outcome = self
            .sheets
            .delete_row(&id, args.sheet_name.as_deref(), row_index(args.row))
            .await?;
        success(outcome)
    }

    async fn search(&self, args: SearchArgs) -> Result<Value, ToolError> {
        let id = self.target.require().await?;
        let query = SearchQuery {
            query: args.query,
            column: args.column,
            sheet: args.sheet_name,
        };
        let results = self.sheets.search(&id, &query).await?;
        Ok(json!({"count": results.len(), "results": results}))
    }
}

#[async_trait]
impl ToolProvider for SheetsToolProvider {
    fn name(&self) -> &'static str {
        "sheets"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        sheet_tools().to_vec()
    }

    fn can_handle(&self, tool_name: &str) -> bool {
        sheet_tools().iter().any(|t| t.name == tool_name)
    }

    async fn execute(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        match tool_name {
            "list_my_sheets" => self.list_my_sheets().await,
            "open_sheet" => self.open_sheet(parse_args(tool_name, arguments)?).await,
            "get_active_sheet" => self.get_active_sheet().await,
            "list_sheets" => self.list_sheets().await,
            "read_sheet" => self.read_sheet(parse_args(tool_name, arguments)?).await,
            "add_row" => self.add_row(parse_args(tool_name, arguments)?).await,
            "update_cell" => self.update_cell(parse_args(tool_name, arguments)?).await,
            "update_row" => self.update_row(parse_args(tool_name, arguments)?).await,
            "delete_row" => self.delete_row(parse_args(tool_name, arguments)?).await,
            "search" => self.search(parse_args(tool_name, arguments)?).await,
            _ => Err(ToolError::UnknownTool(tool_name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_snapshot() {
        let summary: Vec<String> = sheet_tools()
            .iter()
            .map(|t| {
                let required = t
                    .parameters
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|r| {
                        r.iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .unwrap_or_default();
                format!("{}({required})", t.name)
            })
            .collect();

        insta::assert_snapshot!(summary.join("\n"), @r"
        list_my_sheets()
        open_sheet(url)
        get_active_sheet()
        list_sheets()
        read_sheet()
        add_row(data)
        update_cell(row,column,value)
        update_row(row,data)
        delete_row(row)
        search(query)
        ");
    }

    #[test]
    fn test_every_tool_schema_is_an_object() {
        for tool in sheet_tools() {
            assert_eq!(tool.parameters["type"], "object", "{}", tool.name);
            assert!(tool.parameters["properties"].is_object(), "{}", tool.name);
        }
    }

    #[tokio::test]
    async fn test_target_prefers_opened_sheet() {
        let target = SheetTarget::new(None, Some("default".to_string()));
        assert_eq!(target.current().await.as_deref(), Some("default"));
        assert_eq!(target.opened().await, None);

        target.open("opened".to_string()).await;
        assert_eq!(target.current().await.as_deref(), Some("opened"));

        let empty = SheetTarget::default();
        assert!(matches!(
            empty.require().await,
            Err(ToolError::Sheets(SheetsError::NoSpreadsheet))
        ));
    }

    #[test]
    fn test_success_payload() {
        let value = success(json!({"sheet": "Tasks", "row": 2})).unwrap_or_default();
        assert_eq!(value, json!({"success": true, "sheet": "Tasks", "row": 2}));
        assert_eq!(row_index(-3), 0);
    }
}
