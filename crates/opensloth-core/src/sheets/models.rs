//! Data returned by the Sheets client. Everything here serializes into the
//! JSON the model sees as a tool result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A spreadsheet shared with the service account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetSummary {
    /// Spreadsheet id
    pub id: String,
    /// Document title
    pub title: String,
    /// Browser URL
    pub url: String,
}

/// One worksheet tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetInfo {
    /// Tab name
    pub name: String,
    /// Numeric tab id used by structural updates
    #[serde(skip)]
    pub sheet_id: i64,
    /// Grid row count, including the header
    pub rows: usize,
    /// Grid column count
    pub columns: usize,
}

/// Spreadsheet metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetInfo {
    /// Spreadsheet id
    pub id: String,
    /// Document title
    pub title: String,
    /// Browser URL
    pub url: String,
    /// Tabs in display order
    pub worksheets: Vec<WorksheetInfo>,
}

impl SpreadsheetInfo {
    /// Tab names in display order.
    #[must_use]
    pub fn worksheet_names(&self) -> Vec<String> {
        self.worksheets.iter().map(|ws| ws.name.clone()).collect()
    }
}

/// Headers of one tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabStructure {
    /// Tab name
    pub name: String,
    /// Header row
    pub headers: Vec<String>,
    /// Approximate number of data rows
    pub row_count: usize,
}

/// Lightweight shape of a spreadsheet, embedded in the system prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetStructure {
    /// Document title
    pub title: String,
    /// Tabs that have a header row
    pub tabs: Vec<TabStructure>,
}

/// A data row keyed by header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    /// 1-based index, excluding the header row
    pub row: usize,
    /// Header to cell value, in column order
    pub data: Map<String, Value>,
}

impl SheetRow {
    /// Build a row from a header list and raw cells. Missing trailing cells are empty.
    #[must_use]
    pub fn from_cells(row: usize, headers: &[String], cells: &[String]) -> Self {
        let data = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.trim().is_empty())
            .map(|(idx, header)| {
                let value = cells.get(idx).cloned().unwrap_or_default();
                (header.clone(), Value::String(value))
            })
            .collect();
        Self { row, data }
    }
}

/// Contents of one tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    /// Tab name
    pub sheet: String,
    /// Header row
    pub headers: Vec<String>,
    /// Data rows
    pub rows: Vec<SheetRow>,
}

impl TableData {
    /// Split a value grid into header and data rows.
    #[must_use]
    pub fn from_grid(sheet: String, grid: &[Vec<String>]) -> Self {
        let headers = grid.first().cloned().unwrap_or_default();
        let rows = grid
            .iter()
            .skip(1)
            .enumerate()
            .map(|(idx, cells)| SheetRow::from_cells(idx + 1, &headers, cells))
            .collect();
        Self {
            sheet,
            headers,
            rows,
        }
    }
}

/// Search request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Text to look for, case-insensitive
    pub query: String,
    /// Only match cells under this header
    pub column: Option<String>,
    /// Only search this tab
    pub sheet: Option<String>,
}

impl SearchQuery {
    /// Search every tab and column for `query`.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Whether a row satisfies the query.
    #[must_use]
    pub fn matches(&self, row: &SheetRow) -> bool {
        let needle = self.query.to_lowercase();
        let column = self.column.as_deref().map(super::header_key);
        row.data.iter().any(|(header, value)| {
            let in_scope = column
                .as_deref()
                .is_none_or(|wanted| super::header_key(header) == wanted);
            in_scope && super::cell_text(value).to_lowercase().contains(&needle)
        })
    }
}

/// One search match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Tab name
    pub sheet: String,
    /// 1-based data row
    pub row: usize,
    /// Full row contents
    pub data: Map<String, Value>,
}

/// Result of an append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOutcome {
    /// Tab name
    pub sheet: String,
    /// Cells written, in header order
    pub row_added: Vec<String>,
    /// Header row
    pub headers: Vec<String>,
    /// Supplied keys that matched no header
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_keys: Vec<String>,
}

/// Result of a row update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Tab name
    pub sheet: String,
    /// 1-based data row
    pub row: usize,
    /// Header to new value
    pub updated: Map<String, Value>,
}

/// Result of a row deletion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Tab name
    pub sheet: String,
    /// 1-based data row that was removed
    pub row: usize,
    /// Contents of the removed row
    pub deleted: Map<String, Value>,
}
