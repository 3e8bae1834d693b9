//! System prompt composition

use crate::sheets::SheetStructure;
use chrono::NaiveDate;
use std::fmt::Write;

const RULES: &str = r#"
CRITICAL RULES:
1. You already know the sheet structure above. Use the EXACT column names when calling add_row, update_cell or update_row.
2. NEVER ask the user for details you can figure out yourself. Figure it out intelligently:
   - Numeric sequences (IDs, priorities): call read_sheet to see existing data, then assign the next number
   - Dates: use today's date ({today})
   - People/assignee columns: use the user's name or call read_sheet to see existing values
   - Status columns: use a sensible default like "New"
3. ALWAYS call the function immediately, never just describe what you would do.

WORKFLOW FOR ADDING DATA:
1. You already know the column names from the structure above
2. Call read_sheet to see existing data patterns (next ID, existing people, etc.)
3. Build a data object using the exact header names as keys, filling ALL columns intelligently
4. Call add_row with the data. Do NOT ask the user to confirm or provide missing fields

WORKFLOW FOR UPDATING/DELETING DATA:
1. ALWAYS call search or read_sheet FIRST to find the exact row number. NEVER guess row numbers from memory
2. The row numbers in read_sheet results are 1-indexed (row 1 = first data row after header)
3. Match on the value the user mentions to find the correct row
4. Then call update_cell, update_row or delete_row with the verified row number

WORKFLOW FOR OPENING A NEW SHEET:
1. User shares a URL: call open_sheet with the URL
2. If it fails (no access), tell the user to share the sheet with the service account email
3. Once open, the sheet structure will be available on the next message

FORMATTING: Use HTML tags for formatting (this is a Telegram bot). Use <b>bold</b> for headers/emphasis, <i>italic</i> for secondary emphasis, <code>monospace</code> for values/emails/IDs. Use dashes (-) for lists. Do NOT use markdown (no **, no *, no `, no #).

Available functions: open_sheet, get_active_sheet, list_my_sheets, list_sheets, read_sheet, add_row, update_cell, update_row, delete_row, search"#;

/// Build the system prompt for one turn.
///
/// `structure` is the active spreadsheet's shape, or `None` when no sheet is
/// active or it could not be read.
#[must_use]
pub fn build_system_prompt(
    structure: Option<&SheetStructure>,
    service_email: &str,
    today: NaiveDate,
    user_name: &str,
) -> String {
    let today = today.format("%Y-%m-%d").to_string();
    let mut prompt = format!(
        "You are a helpful assistant that can read and write to Google Sheets.\nToday's date is {today}.\n"
    );

    if !service_email.is_empty() {
        let _ = write!(
            prompt,
            "\nSERVICE ACCOUNT EMAIL (for sharing sheets): {service_email}\n"
        );
    }

    match structure {
        Some(structure) => {
            let _ = write!(prompt, "\nACTIVE SHEET: \"{}\"\n", structure.title);
            for tab in &structure.tabs {
                let headers = serde_json::to_string(&tab.headers).unwrap_or_default();
                let _ = write!(
                    prompt,
                    "\nTab \"{}\" (~{} rows):\n  Columns: {headers}",
                    tab.name, tab.row_count
                );
            }
            prompt.push('\n');
        }
        None => prompt.push_str(
            "\nNO SHEET ACTIVE. If the user shares a Google Sheets URL, use open_sheet to connect.\n\
             If open_sheet fails, tell them to share the sheet with the service account email above.\n",
        ),
    }

    prompt.push_str(&RULES.replace("{today}", &today));
    let _ = write!(prompt, "\n\nUser: {user_name}");
    prompt
}
