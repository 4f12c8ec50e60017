// SPDX-License-Identifier: Apache-2.0

use crate::StoreResult;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Cell grid as returned by a range read. Rows may be ragged; trailing
/// empty cells and rows are usually omitted.
pub type CellRows = Vec<Vec<Value>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub title: String,
    pub sheet_count: usize,
}

/// Range-level access to one spreadsheet. Ranges are A1 strings that
/// include the sheet name.
#[async_trait]
pub trait SheetsBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str {
        "unknown"
    }

    async fn get_range(&self, range: &str) -> StoreResult<CellRows>;

    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> StoreResult<()>;

    /// Inserts rows after the last non-empty row of the table found in
    /// `range`. Returns the range the service reports as written.
    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> StoreResult<Option<String>>;

    /// Blanks values in place; row structure is untouched.
    async fn clear_range(&self, range: &str) -> StoreResult<()>;

    /// Structural delete of zero-based rows `[start, end)`.
    async fn batch_delete_rows(&self, sheet_id: i64, start: u32, end: u32) -> StoreResult<()>;

    /// Numeric id of a sheet tab by title. `0` is a valid id.
    async fn sheet_id(&self, sheet: &str) -> StoreResult<Option<i64>>;

    async fn check_connection(&self) -> StoreResult<ConnectionReport>;
}
