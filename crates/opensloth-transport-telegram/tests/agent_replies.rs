use async_trait::async_trait;
use opensloth_core::agent::{AgentOptions, SheetAgent, UserContext};
use opensloth_core::llm::{LlmError, LlmProvider, LlmResponse, Message, ToolDefinition};
use opensloth_core::sheets::{
    AppendOutcome, DeleteOutcome, SearchHit, SearchQuery, SheetStructure, SheetsApi, SheetsError,
    SpreadsheetInfo, SpreadsheetSummary, TableData, UpdateOutcome,
};
use opensloth_transport_telegram::bot::handlers::{
    answer, GENERIC_FAILURE_REPLY, LLM_FAILURE_REPLY,
};
use serde_json::{Map, Value};
use std::sync::Arc;

enum Behavior {
    Reply(&'static str),
    Fail,
    Panic,
}

struct FixedLlm(Behavior);

#[async_trait]
impl LlmProvider for FixedLlm {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn model(&self) -> String {
        "fixed-1".to_string()
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        match self.0 {
            Behavior::Reply(text) => Ok(LlmResponse::FinalMessage(text.to_string())),
            Behavior::Fail => Err(LlmError::NetworkError("connection refused".to_string())),
            Behavior::Panic => panic!("provider bug"),
        }
    }
}

/// Sheets client with no spreadsheet behind it
struct NoSheets;

#[async_trait]
impl SheetsApi for NoSheets {
    fn service_account_email(&self) -> String {
        "sloth@test.iam.gserviceaccount.com".to_string()
    }

    async fn list_spreadsheets(&self) -> Result<Vec<SpreadsheetSummary>, SheetsError> {
        Ok(Vec::new())
    }

    async fn spreadsheet_info(&self, _id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        Err(SheetsError::NoSpreadsheet)
    }

    async fn sheet_structure(&self, _id: &str) -> Result<SheetStructure, SheetsError> {
        Err(SheetsError::NoSpreadsheet)
    }

    async fn read_rows(&self, _id: &str, _sheet: Option<&str>) -> Result<TableData, SheetsError> {
        Err(SheetsError::NoSpreadsheet)
    }

    async fn append_row(
        &self,
        _id: &str,
        _sheet: Option<&str>,
        _data: &Map<String, Value>,
    ) -> Result<AppendOutcome, SheetsError> {
        Err(SheetsError::NoSpreadsheet)
    }

    async fn update_row(
        &self,
        _id: &str,
        _sheet: Option<&str>,
        _row: usize,
        _data: &Map<String, Value>,
    ) -> Result<UpdateOutcome, SheetsError> {
        Err(SheetsError::NoSpreadsheet)
    }

    async fn delete_row(
        &self,
        _id: &str,
        _sheet: Option<&str>,
        _row: usize,
    ) -> Result<DeleteOutcome, SheetsError> {
        Err(SheetsError::NoSpreadsheet)
    }

    async fn search(&self, _id: &str, _query: &SearchQuery) -> Result<Vec<SearchHit>, SheetsError> {
        Err(SheetsError::NoSpreadsheet)
    }

    async fn health_check(&self, _id: Option<&str>) -> Result<(), SheetsError> {
        Ok(())
    }
}

fn agent(behavior: Behavior) -> Arc<SheetAgent> {
    Arc::new(SheetAgent::new(
        Arc::new(FixedLlm(behavior)),
        Arc::new(NoSheets),
        AgentOptions::default(),
    ))
}

fn user() -> UserContext {
    UserContext {
        user_id: 99,
        username: Some("tester".to_string()),
        ..UserContext::default()
    }
}

#[tokio::test]
async fn test_reply_is_passed_through() {
    let agent = agent(Behavior::Reply("<b>3</b> rows"));
    let reply = answer(Arc::clone(&agent), 1, user(), "count rows".to_string()).await;
    assert_eq!(reply, "<b>3</b> rows");

    let history = agent.history(1).await.map(|h| h.len());
    assert_eq!(history, Some(2));
}

#[tokio::test]
async fn test_llm_failure_gets_friendly_reply() {
    let reply = answer(agent(Behavior::Fail), 1, user(), "hi".to_string()).await;
    assert_eq!(reply, LLM_FAILURE_REPLY);
    assert!(!reply.contains("connection refused"));
}

#[tokio::test]
async fn test_crashed_turn_gets_generic_reply() {
    let agent = agent(Behavior::Panic);
    let reply = answer(Arc::clone(&agent), 5, user(), "hi".to_string()).await;
    assert_eq!(reply, GENERIC_FAILURE_REPLY);

    // The chat stays usable after a crashed turn
    assert!(!agent.sessions().is_busy(&5).await);
}
