//! REST implementation of [`SheetsApi`].

use super::auth::ServiceAccountAuth;
use super::models::{
    AppendOutcome, DeleteOutcome, SearchHit, SearchQuery, SheetStructure, SpreadsheetInfo,
    SpreadsheetSummary, TabStructure, TableData, UpdateOutcome, WorksheetInfo,
};
use super::{cell_text, column_letter, header_key, quote_sheet_name, SheetsApi, SheetsError};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const METADATA_FIELDS: &str = "spreadsheetId,spreadsheetUrl,properties.title,\
sheets.properties(sheetId,title,index,gridProperties(rowCount,columnCount))";
const HTTP_TIMEOUT_SECS: u64 = 30;
/// Retries after the first attempt
const SHEETS_MAX_RETRIES: usize = 2;
const SHEETS_INITIAL_BACKOFF_MS: u64 = 2_000;
const SHEETS_MAX_BACKOFF_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetResource {
    spreadsheet_id: String,
    spreadsheet_url: Option<String>,
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetResource>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetResource {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: i64,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: usize,
    #[serde(default)]
    column_count: usize,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ValueRange {
    fn into_grid(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

impl From<SpreadsheetResource> for SpreadsheetInfo {
    fn from(resource: SpreadsheetResource) -> Self {
        let mut sheets = resource.sheets;
        sheets.sort_by_key(|s| s.properties.index);
        let url = resource.spreadsheet_url.unwrap_or_else(|| {
            format!(
                "https://docs.google.com/spreadsheets/d/{}",
                resource.spreadsheet_id
            )
        });
        Self {
            id: resource.spreadsheet_id,
            title: resource.properties.title,
            url,
            worksheets: sheets
                .into_iter()
                .map(|s| WorksheetInfo {
                    name: s.properties.title,
                    sheet_id: s.properties.sheet_id,
                    rows: s.properties.grid_properties.row_count,
                    columns: s.properties.grid_properties.column_count,
                })
                .collect(),
        }
    }
}

/// Google Sheets client authenticated as a service account
pub struct GoogleSheetsClient {
    auth: ServiceAccountAuth,
    http_client: HttpClient,
}

impl GoogleSheetsClient {
    /// Create a client from the service-account key file.
    ///
    /// # Errors
    ///
    /// Returns `SheetsError::Credentials` if the key file is missing or invalid.
    pub fn new(credentials_file: &str) -> Result<Self, SheetsError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        let auth = ServiceAccountAuth::from_file(Path::new(credentials_file), http_client.clone())?;
        info!(email = %auth.email(), "Loaded Google service account");
        Ok(Self { auth, http_client })
    }

    fn sheets_url(segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(SHEETS_API_BASE).map_err(|e| SheetsError::Api {
            status: 0,
            message: format!("invalid URL: {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|()| SheetsError::Api {
                status: 0,
                message: "base URL cannot have path segments".to_string(),
            })?
            .extend(segments);
        Ok(url)
    }

    /// Send a request, retrying rate limits, server errors and network failures
    /// with exponential backoff.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Value, SheetsError> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(SHEETS_INITIAL_BACKOFF_MS / 2)
            .max_delay(Duration::from_secs(SHEETS_MAX_BACKOFF_SECS))
            .take(SHEETS_MAX_RETRIES);

        RetryIf::spawn(
            strategy,
            || self.send_once(method.clone(), url.clone(), body.as_ref()),
            |e: &SheetsError| {
                let transient = e.is_transient();
                if transient {
                    warn!(error = %e, "Transient Google Sheets error, retrying");
                }
                transient
            },
        )
        .await
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, SheetsError> {
        let token = self.auth.access_token().await?;
        debug!(method = %method, path = url.path(), "Google API request");

        let mut request = self.http_client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &text, self.auth.email()));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| SheetsError::Json(e.to_string()))
    }

    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let mut url = Self::sheets_url(&[spreadsheet_id, "values", range])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        let value = self.execute(Method::GET, url, None).await?;
        let range: ValueRange = decode(value)?;
        Ok(range.into_grid())
    }

    async fn batch_get_values(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> Result<Vec<Vec<Vec<String>>>, SheetsError> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        let mut url = Self::sheets_url(&[spreadsheet_id, "values:batchGet"])?;
        {
            let mut query = url.query_pairs_mut();
            for range in ranges {
                query.append_pair("ranges", range);
            }
            query.append_pair("valueRenderOption", "FORMATTED_VALUE");
        }
        let value = self.execute(Method::GET, url, None).await?;
        let response: BatchGetResponse = decode(value)?;
        Ok(response
            .value_ranges
            .into_iter()
            .map(ValueRange::into_grid)
            .collect())
    }

    async fn worksheet(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
    ) -> Result<WorksheetInfo, SheetsError> {
        let info = self.spreadsheet_info(spreadsheet_id).await?;
        resolve_worksheet(&info, sheet).cloned()
    }

    async fn read_table(
        &self,
        spreadsheet_id: &str,
        worksheet: &WorksheetInfo,
    ) -> Result<TableData, SheetsError> {
        let grid = self
            .get_values(spreadsheet_id, &quote_sheet_name(&worksheet.name))
            .await?;
        Ok(TableData::from_grid(worksheet.name.clone(), &grid))
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    fn service_account_email(&self) -> String {
        self.auth.email().to_string()
    }

    async fn list_spreadsheets(&self) -> Result<Vec<SpreadsheetSummary>, SheetsError> {
        let mut url = Url::parse(DRIVE_FILES_URL).map_err(|e| SheetsError::Api {
            status: 0,
            message: format!("invalid URL: {e}"),
        })?;
        url.query_pairs_mut()
            .append_pair(
                "q",
                &format!("mimeType='{SPREADSHEET_MIME}' and trashed=false"),
            )
            .append_pair("fields", "files(id,name,webViewLink)")
            .append_pair("pageSize", "100");

        let value = match self.execute(Method::GET, url, None).await {
            Ok(value) => value,
            Err(SheetsError::PermissionDenied { .. }) => {
                return Err(SheetsError::Api {
                    status: 403,
                    message: "Enable Google Drive API to list all sheets, or share a sheet URL directly"
                        .to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let list: DriveFileList = decode(value)?;
        Ok(list
            .files
            .into_iter()
            .map(|file| SpreadsheetSummary {
                url: file.web_view_link.unwrap_or_else(|| {
                    format!("https://docs.google.com/spreadsheets/d/{}", file.id)
                }),
                id: file.id,
                title: file.name,
            })
            .collect())
    }

    async fn spreadsheet_info(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        let mut url = Self::sheets_url(&[spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", METADATA_FIELDS);
        let value = self.execute(Method::GET, url, None).await?;
        let resource: SpreadsheetResource = decode(value)?;
        Ok(resource.into())
    }

    async fn sheet_structure(&self, spreadsheet_id: &str) -> Result<SheetStructure, SheetsError> {
        let info = self.spreadsheet_info(spreadsheet_id).await?;
        let ranges: Vec<String> = info
            .worksheets
            .iter()
            .map(|ws| format!("{}!1:1", quote_sheet_name(&ws.name)))
            .collect();
        let grids = self.batch_get_values(spreadsheet_id, &ranges).await?;

        let tabs = info
            .worksheets
            .iter()
            .zip(grids)
            .filter_map(|(ws, grid)| {
                let headers = grid.into_iter().next().unwrap_or_default();
                if headers.iter().all(|h| h.trim().is_empty()) {
                    debug!(tab = %ws.name, "Skipping tab without headers");
                    return None;
                }
                Some(TabStructure {
                    name: ws.name.clone(),
                    headers,
                    row_count: ws.rows.saturating_sub(1),
                })
            })
            .collect();

        Ok(SheetStructure {
            title: info.title,
            tabs,
        })
    }

    async fn read_rows(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
    ) -> Result<TableData, SheetsError> {
        let worksheet = self.worksheet(spreadsheet_id, sheet).await?;
        self.read_table(spreadsheet_id, &worksheet).await
    }

    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
        data: &Map<String, Value>,
    ) -> Result<AppendOutcome, SheetsError> {
        let worksheet = self.worksheet(spreadsheet_id, sheet).await?;
        let quoted = quote_sheet_name(&worksheet.name);
        let headers = self
            .get_values(spreadsheet_id, &format!("{quoted}!1:1"))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let (row, ignored_keys) = map_row_to_headers(&headers, data)?;

        let mut url = Self::sheets_url(&[spreadsheet_id, "values", &format!("{quoted}!A1:append")])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.execute(Method::POST, url, Some(json!({ "values": [row] })))
            .await?;

        info!(tab = %worksheet.name, cells = row.len(), "Appended row");
        Ok(AppendOutcome {
            sheet: worksheet.name,
            row_added: row,
            headers,
            ignored_keys,
        })
    }

    async fn update_row(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
        row: usize,
        data: &Map<String, Value>,
    ) -> Result<UpdateOutcome, SheetsError> {
        let worksheet = self.worksheet(spreadsheet_id, sheet).await?;
        let table = self.read_table(spreadsheet_id, &worksheet).await?;
        check_row(row, table.rows.len())?;

        if data.is_empty() {
            return Err(SheetsError::UnmappedData {
                headers: table.headers,
            });
        }

        let quoted = quote_sheet_name(&worksheet.name);
        let mut updates = Vec::with_capacity(data.len());
        let mut updated = Map::new();
        for (column, value) in data {
            let idx = find_column(&table.headers, column)?;
            updates.push(json!({
                "range": format!("{quoted}!{}{}", column_letter(idx + 1), row + 1),
                "values": [[cell_text(value)]]
            }));
            updated.insert(table.headers[idx].clone(), Value::String(cell_text(value)));
        }

        let url = Self::sheets_url(&[spreadsheet_id, "values:batchUpdate"])?;
        let body = json!({"valueInputOption": "USER_ENTERED", "data": updates});
        self.execute(Method::POST, url, Some(body)).await?;

        info!(tab = %worksheet.name, row, cells = updated.len(), "Updated row");
        Ok(UpdateOutcome {
            sheet: worksheet.name,
            row,
            updated,
        })
    }

    async fn delete_row(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
        row: usize,
    ) -> Result<DeleteOutcome, SheetsError> {
        let worksheet = self.worksheet(spreadsheet_id, sheet).await?;
        let table = self.read_table(spreadsheet_id, &worksheet).await?;
        check_row(row, table.rows.len())?;
        let deleted = table.rows[row - 1].data.clone();

        // Data row N is sheet row N + 1, i.e. zero-based index N
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": worksheet.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row,
                        "endIndex": row + 1
                    }
                }
            }]
        });
        let url = Self::sheets_url(&[&format!("{spreadsheet_id}:batchUpdate")])?;
        self.execute(Method::POST, url, Some(body)).await?;

        info!(tab = %worksheet.name, row, "Deleted row");
        Ok(DeleteOutcome {
            sheet: worksheet.name,
            row,
            deleted,
        })
    }

    async fn search(
        &self,
        spreadsheet_id: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SheetsError> {
        let info = self.spreadsheet_info(spreadsheet_id).await?;
        let worksheets: Vec<&WorksheetInfo> = match query.sheet.as_deref() {
            Some(name) => vec![resolve_worksheet(&info, Some(name))?],
            None => info.worksheets.iter().collect(),
        };
        let ranges: Vec<String> = worksheets
            .iter()
            .map(|ws| quote_sheet_name(&ws.name))
            .collect();
        let grids = self.batch_get_values(spreadsheet_id, &ranges).await?;

        let tables: Vec<TableData> = worksheets
            .iter()
            .zip(grids)
            .map(|(ws, grid)| TableData::from_grid(ws.name.clone(), &grid))
            .collect();

        search_tables(&tables, query, query.sheet.is_some())
    }

    async fn health_check(&self, spreadsheet_id: Option<&str>) -> Result<(), SheetsError> {
        self.auth.access_token().await?;
        if let Some(id) = spreadsheet_id {
            let info = self.spreadsheet_info(id).await?;
            info!(title = %info.title, "Default spreadsheet reachable");
        }
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, SheetsError> {
    serde_json::from_value(value).map_err(|e| SheetsError::Json(e.to_string()))
}

/// Maps an error response to a typed failure.
fn status_error(status: StatusCode, body: &str, email: &str) -> SheetsError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| crate::utils::truncate_str(body, 300));

    match status {
        StatusCode::NOT_FOUND => SheetsError::SpreadsheetNotFound {
            email: email.to_string(),
        },
        StatusCode::FORBIDDEN => SheetsError::PermissionDenied {
            email: email.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => SheetsError::RateLimited(message),
        _ => SheetsError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Finds a tab by exact name, then case-insensitively. `None` selects the first tab.
fn resolve_worksheet<'a>(
    info: &'a SpreadsheetInfo,
    sheet: Option<&str>,
) -> Result<&'a WorksheetInfo, SheetsError> {
    let not_found = |name: &str| SheetsError::WorksheetNotFound {
        name: name.to_string(),
        available: info.worksheet_names(),
    };

    match sheet.map(str::trim).filter(|s| !s.is_empty()) {
        None => info.worksheets.first().ok_or_else(|| not_found("(first sheet)")),
        Some(name) => info
            .worksheets
            .iter()
            .find(|ws| ws.name == name)
            .or_else(|| {
                info.worksheets
                    .iter()
                    .find(|ws| header_key(&ws.name) == header_key(name))
            })
            .ok_or_else(|| not_found(name)),
    }
}

fn find_column(headers: &[String], column: &str) -> Result<usize, SheetsError> {
    let wanted = header_key(column);
    headers
        .iter()
        .position(|h| header_key(h) == wanted)
        .ok_or_else(|| SheetsError::ColumnNotFound {
            column: column.to_string(),
            available: headers.to_vec(),
        })
}

const fn check_row(row: usize, last: usize) -> Result<(), SheetsError> {
    if row == 0 || row > last {
        return Err(SheetsError::InvalidRow { row, last });
    }
    Ok(())
}

/// Lays out `data` in header order. Keys match headers case-insensitively.
///
/// Returns the cells and the keys that matched nothing.
fn map_row_to_headers(
    headers: &[String],
    data: &Map<String, Value>,
) -> Result<(Vec<String>, Vec<String>), SheetsError> {
    let by_key: Map<String, Value> = data
        .iter()
        .map(|(k, v)| (header_key(k), v.clone()))
        .collect();

    let row: Vec<String> = headers
        .iter()
        .map(|h| by_key.get(&header_key(h)).map(cell_text).unwrap_or_default())
        .collect();

    if row.iter().all(String::is_empty) {
        warn!(headers = ?headers, keys = ?data.keys().collect::<Vec<_>>(), "Could not map data to headers");
        return Err(SheetsError::UnmappedData {
            headers: headers.to_vec(),
        });
    }

    let known: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
    let ignored = data
        .keys()
        .filter(|k| !known.contains(&header_key(k)))
        .cloned()
        .collect();

    Ok((row, ignored))
}

/// Runs `query` over already-fetched tabs.
///
/// With `strict_column`, a column filter naming a missing header is an error;
/// otherwise tabs without that header are skipped.
fn search_tables(
    tables: &[TableData],
    query: &SearchQuery,
    strict_column: bool,
) -> Result<Vec<SearchHit>, SheetsError> {
    let mut hits = Vec::new();
    for table in tables {
        if let Some(column) = query.column.as_deref() {
            if let Err(e) = find_column(&table.headers, column) {
                if strict_column {
                    return Err(e);
                }
                debug!(tab = %table.sheet, column, "Skipping tab without column");
                continue;
            }
        }
        hits.extend(
            table
                .rows
                .iter()
                .filter(|row| query.matches(row))
                .map(|row| SearchHit {
                    sheet: table.sheet.clone(),
                    row: row.row,
                    data: row.data.clone(),
                }),
        );
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SpreadsheetInfo {
        let resource: SpreadsheetResource = serde_json::from_value(json!({
            "spreadsheetId": "abc",
            "properties": {"title": "Team"},
            "sheets": [
                {"properties": {"sheetId": 7, "title": "Archive", "index": 1,
                    "gridProperties": {"rowCount": 50, "columnCount": 4}}},
                {"properties": {"sheetId": 0, "title": "Tasks", "index": 0,
                    "gridProperties": {"rowCount": 1000, "columnCount": 26}}}
            ]
        }))
        .unwrap_or_else(|e| panic!("fixture: {e}"));
        resource.into()
    }

    fn headers() -> Vec<String> {
        vec!["Name".to_string(), "Status".to_string(), "Due Date".to_string()]
    }

    #[test]
    fn test_metadata_is_ordered_by_index() {
        let info = info();
        assert_eq!(info.worksheet_names(), vec!["Tasks", "Archive"]);
        assert_eq!(info.url, "https://docs.google.com/spreadsheets/d/abc");
        assert_eq!(info.worksheets[1].sheet_id, 7);
    }

    #[test]
    fn test_resolve_worksheet() {
        let info = info();
        assert_eq!(resolve_worksheet(&info, None).map(|w| w.name.as_str()).ok(), Some("Tasks"));
        assert_eq!(
            resolve_worksheet(&info, Some("archive")).map(|w| w.sheet_id).ok(),
            Some(7)
        );
        assert!(matches!(
            resolve_worksheet(&info, Some("Budget")),
            Err(SheetsError::WorksheetNotFound { ref available, .. }) if available.len() == 2
        ));
    }

    #[test]
    fn test_map_row_is_case_insensitive() {
        let mut data = Map::new();
        data.insert("name".to_string(), json!("Fix login"));
        data.insert(" STATUS ".to_string(), json!("Open"));
        data.insert("Priority".to_string(), json!(2));

        let (row, ignored) = map_row_to_headers(&headers(), &data)
            .unwrap_or_else(|e| panic!("mapping failed: {e}"));
        assert_eq!(row, vec!["Fix login", "Open", ""]);
        assert_eq!(ignored, vec!["Priority"]);
    }

    #[test]
    fn test_unmappable_data_is_rejected() {
        let mut data = Map::new();
        data.insert("Color".to_string(), json!("red"));
        assert!(matches!(
            map_row_to_headers(&headers(), &data),
            Err(SheetsError::UnmappedData { ref headers }) if headers.len() == 3
        ));
    }

    #[test]
    fn test_row_bounds() {
        assert!(check_row(1, 3).is_ok());
        assert!(check_row(3, 3).is_ok());
        assert!(matches!(check_row(0, 3), Err(SheetsError::InvalidRow { row: 0, last: 3 })));
        assert!(matches!(check_row(4, 3), Err(SheetsError::InvalidRow { row: 4, .. })));
    }

    #[test]
    fn test_status_mapping() {
        let email = "bot@x.iam.gserviceaccount.com";
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", email),
            SheetsError::SpreadsheetNotFound { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "", email),
            SheetsError::PermissionDenied { .. }
        ));
        let body = r#"{"error": {"code": 400, "message": "Unable to parse range", "status": "INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, body, email),
            SheetsError::Api { status: 400, ref message } if message == "Unable to parse range"
        ));
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "quota", email).is_transient());
    }

    #[test]
    fn test_search_across_tabs_skips_missing_columns() {
        let tasks = TableData::from_grid(
            "Tasks".to_string(),
            &[
                vec!["Name".into(), "Owner".into()],
                vec!["Fix login".into(), "Bob".into()],
            ],
        );
        let notes = TableData::from_grid(
            "Notes".to_string(),
            &[vec!["Text".into()], vec!["call bob".into()]],
        );

        let all = search_tables(&[tasks.clone(), notes.clone()], &SearchQuery::new("bob"), false)
            .unwrap_or_default();
        assert_eq!(all.len(), 2);
        assert_eq!((all[1].sheet.as_str(), all[1].row), ("Notes", 1));

        let by_owner = SearchQuery {
            query: "bob".to_string(),
            column: Some("owner".to_string()),
            sheet: None,
        };
        let hits = search_tables(&[tasks, notes.clone()], &by_owner, false).unwrap_or_default();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sheet, "Tasks");

        assert!(matches!(
            search_tables(&[notes], &by_owner, true),
            Err(SheetsError::ColumnNotFound { .. })
        ));
    }
}
