//! Google Sheets access
//!
//! [`SheetsApi`] is the seam the agent tools call through. [`GoogleSheetsClient`]
//! implements it over the Sheets v4 and Drive v3 REST APIs with a
//! service-account token.

#![allow(clippy::non_std_lazy_statics)]

mod auth;
mod client;
mod models;

pub use auth::{ServiceAccountAuth, ServiceAccountKey};
pub use client::GoogleSheetsClient;
pub use models::{
    AppendOutcome, DeleteOutcome, SearchHit, SearchQuery, SheetRow, SheetStructure,
    SpreadsheetInfo, SpreadsheetSummary, TabStructure, TableData, UpdateOutcome, WorksheetInfo,
};

use async_trait::async_trait;
use lazy_regex::lazy_regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Spreadsheet id inside a Google Sheets URL
static RE_SPREADSHEET_ID: lazy_regex::Lazy<lazy_regex::Regex> =
    lazy_regex!(r"/spreadsheets/d/([a-zA-Z0-9_-]+)");

/// Errors surfaced by the Sheets client
#[derive(Debug, Error)]
pub enum SheetsError {
    /// The service-account key could not be read or parsed
    #[error("Invalid service-account credentials: {0}")]
    Credentials(String),
    /// Token exchange with Google failed
    #[error("Google authentication failed: {0}")]
    Auth(String),
    /// Spreadsheet does not exist or is not shared with the service account
    #[error("Sheet not found. Share it with: {email}")]
    SpreadsheetNotFound {
        /// Service-account email to share the sheet with
        email: String,
    },
    /// The service account lacks access
    #[error("No access. Share the sheet with: {email}")]
    PermissionDenied {
        /// Service-account email to share the sheet with
        email: String,
    },
    /// No worksheet tab with that name
    #[error("Worksheet '{name}' not found. Available: {available:?}")]
    WorksheetNotFound {
        /// Requested tab name
        name: String,
        /// Existing tab names
        available: Vec<String>,
    },
    /// No header matches the requested column
    #[error("Column '{column}' not found. Available: {available:?}")]
    ColumnNotFound {
        /// Requested column
        column: String,
        /// Existing headers
        available: Vec<String>,
    },
    /// Row index outside the data rows
    #[error("Row {row} is out of range. Data rows are numbered 1 to {last}, excluding the header")]
    InvalidRow {
        /// Requested 1-based data row
        row: usize,
        /// Last existing data row
        last: usize,
    },
    /// None of the supplied keys matched a header
    #[error("Could not map data. Sheet headers are: {headers:?}")]
    UnmappedData {
        /// Existing headers
        headers: Vec<String>,
    },
    /// Google rejected the request with 429
    #[error("Google Sheets rate limit exceeded: {0}")]
    RateLimited(String),
    /// Any other non-success response
    #[error("Google API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from Google
        message: String,
    },
    /// Connectivity problem
    #[error("Network error: {0}")]
    Network(String),
    /// Malformed response payload
    #[error("JSON error: {0}")]
    Json(String),
    /// Neither an opened nor a default spreadsheet is available
    #[error("No spreadsheet is active. Share a Google Sheets URL and ask me to open it.")]
    NoSpreadsheet,
}

impl SheetsError {
    /// Whether a retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Operations the agent performs against a spreadsheet.
///
/// Every call names its target spreadsheet. Tab names are optional and
/// default to the first worksheet. Row numbers are 1-based and exclude the
/// header row.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Email of the service account, shown to users so they can share sheets
    fn service_account_email(&self) -> String;

    /// All spreadsheets shared with the service account
    async fn list_spreadsheets(&self) -> Result<Vec<SpreadsheetSummary>, SheetsError>;

    /// Title, URL and tabs of a spreadsheet
    async fn spreadsheet_info(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError>;

    /// Headers and approximate size of every non-empty tab
    async fn sheet_structure(&self, spreadsheet_id: &str) -> Result<SheetStructure, SheetsError>;

    /// Every data row of a tab
    async fn read_rows(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
    ) -> Result<TableData, SheetsError>;

    /// Append a row, matching keys to headers case-insensitively
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
        data: &Map<String, Value>,
    ) -> Result<AppendOutcome, SheetsError>;

    /// Overwrite the named columns of one row
    async fn update_row(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
        row: usize,
        data: &Map<String, Value>,
    ) -> Result<UpdateOutcome, SheetsError>;

    /// Remove one row, shifting the rows below it up
    async fn delete_row(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
        row: usize,
    ) -> Result<DeleteOutcome, SheetsError>;

    /// Case-insensitive substring search over cell values
    async fn search(
        &self,
        spreadsheet_id: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SheetsError>;

    /// Verify credentials and, when given, access to a spreadsheet
    async fn health_check(&self, spreadsheet_id: Option<&str>) -> Result<(), SheetsError>;
}

/// Extracts the spreadsheet id from a Google Sheets URL, or returns the input
/// trimmed when it is already an id.
///
/// # Examples
///
/// ```
/// use opensloth_core::sheets::extract_spreadsheet_id;
/// let url = "https://docs.google.com/spreadsheets/d/1AbC-d_9/edit#gid=0";
/// assert_eq!(extract_spreadsheet_id(url), "1AbC-d_9");
/// assert_eq!(extract_spreadsheet_id(" 1AbC-d_9 "), "1AbC-d_9");
/// ```
#[must_use]
pub fn extract_spreadsheet_id(url_or_id: &str) -> String {
    RE_SPREADSHEET_ID
        .captures(url_or_id)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| url_or_id.trim().to_string(), |m| m.as_str().to_string())
}

/// Converts a 1-based column number to A1 notation letters (1 → A, 27 → AA).
#[must_use]
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quotes a tab name for use in an A1 range.
#[must_use]
pub fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Renders a JSON value as the text written into a cell.
#[must_use]
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalizes a header or key for case-insensitive matching.
#[must_use]
pub fn header_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_extract_id_from_url_variants() {
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/abc_DEF-123/edit?usp=sharing"),
            "abc_DEF-123"
        );
        assert_eq!(
            extract_spreadsheet_id("see docs.google.com/spreadsheets/d/XYZ"),
            "XYZ"
        );
        assert_eq!(extract_spreadsheet_id("plainId"), "plainId");
    }

    #[test]
    fn test_quote_sheet_name_escapes_quotes() {
        assert_eq!(quote_sheet_name("Q1 Sales"), "'Q1 Sales'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("x")), "x");
        assert_eq!(cell_text(&json!(3)), "3");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_transient_errors() {
        assert!(SheetsError::RateLimited(String::new()).is_transient());
        assert!(SheetsError::Api { status: 503, message: String::new() }.is_transient());
        assert!(!SheetsError::Api { status: 400, message: String::new() }.is_transient());
        assert!(!SheetsError::NoSpreadsheet.is_transient());
    }

    #[test]
    fn test_share_hint_in_messages() {
        let err = SheetsError::PermissionDenied {
            email: "bot@proj.iam.gserviceaccount.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No access. Share the sheet with: bot@proj.iam.gserviceaccount.com"
        );
    }
}
