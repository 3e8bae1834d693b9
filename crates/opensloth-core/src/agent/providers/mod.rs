//! Tool providers for the agent
//!
//! - `SheetsToolProvider`: spreadsheet tools over a [`SheetsApi`](crate::sheets::SheetsApi)

mod sheets;

pub use sheets::{sheet_tools, SheetTarget, SheetsToolProvider};
