// SPDX-License-Identifier: Apache-2.0

use crate::address::{end_column, quote_sheet, A1Range};
use crate::{CellRows, ConnectionReport, SheetsBackend, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct FakeSheet {
    id: i64,
    grid: Vec<Vec<String>>,
}

impl FakeSheet {
    fn trimmed(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = self.grid.iter().map(|r| trim_row(r)).collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        rows
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> &mut String {
        if self.grid.len() <= row {
            self.grid.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.grid[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, String::new);
        }
        &mut cells[col]
    }
}

fn trim_row(row: &[String]) -> Vec<String> {
    let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
    row[..len].to_vec()
}

/// In-memory spreadsheet following the service's range semantics closely
/// enough for the store: ragged reads, append after the last filled row,
/// structural deletes by sheet id.
pub struct FakeSheets {
    title: String,
    sheets: Mutex<BTreeMap<String, FakeSheet>>,
    next_id: AtomicU64,
    pub calls: AtomicU64,
    offline: AtomicBool,
}

impl Default for FakeSheets {
    fn default() -> Self {
        Self {
            title: "rollcall-fake".to_string(),
            sheets: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            calls: AtomicU64::new(0),
            offline: AtomicBool::new(false),
        }
    }
}

impl FakeSheets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet seeded with `rows` (row 1 first).
    #[must_use]
    pub fn with_sheet<R, C>(mut self, name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let id = self.allocate_id();
        let grid = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();
        self.sheets
            .get_mut()
            .insert(name.to_string(), FakeSheet { id, grid });
        self
    }

    pub async fn add_sheet(&self, name: &str) {
        let id = self.allocate_id();
        self.sheets
            .lock()
            .await
            .entry(name.to_string())
            .or_insert(FakeSheet { id, grid: Vec::new() });
    }

    /// Current cell grid with trailing empty cells and rows removed.
    pub async fn snapshot(&self, name: &str) -> Option<Vec<Vec<String>>> {
        self.sheets.lock().await.get(name).map(FakeSheet::trimmed)
    }

    /// Makes every backend call fail as an unreachable service would.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn allocate_id(&self) -> i64 {
        i64::try_from(self.next_id.fetch_add(1, Ordering::Relaxed)).unwrap_or(i64::MAX)
    }

    fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.offline.load(Ordering::Relaxed) {
            return Err(StoreError::Upstream(
                "spreadsheet service unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_range(range: &str) -> StoreResult<A1Range> {
    A1Range::parse(range)
        .map_err(|e| StoreError::Upstream(format!("Unable to parse range: {range} ({e})")))
}

fn unknown_sheet(range: &str) -> StoreError {
    StoreError::Upstream(format!("Unable to parse range: {range}"))
}

fn index(one_based: u32) -> usize {
    usize::try_from(one_based.saturating_sub(1)).unwrap_or(usize::MAX)
}

#[async_trait]
impl SheetsBackend for FakeSheets {
    fn backend_tag(&self) -> &'static str {
        "fake"
    }

    async fn get_range(&self, range: &str) -> StoreResult<CellRows> {
        self.enter()?;
        let parsed = parse_range(range)?;
        let sheets = self.sheets.lock().await;
        let sheet = sheets.get(&parsed.sheet).ok_or_else(|| unknown_sheet(range))?;
        let bounds = parsed.bounds();
        let trimmed = sheet.trimmed();
        let first = index(bounds.first_row);
        let mut out: Vec<Vec<Value>> = trimmed
            .iter()
            .enumerate()
            .skip(first)
            .take_while(|(i, _)| bounds.last_row.map_or(true, |last| *i < index(last) + 1))
            .map(|(_, row)| {
                let cells: Vec<String> = row
                    .iter()
                    .enumerate()
                    .filter(|(c, _)| {
                        u32::try_from(*c).is_ok_and(|c| bounds.contains_col(c))
                    })
                    .map(|(_, v)| v.clone())
                    .collect();
                trim_row(&cells).into_iter().map(Value::String).collect()
            })
            .collect();
        while out.last().is_some_and(Vec::is_empty) {
            out.pop();
        }
        Ok(out)
    }

    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> StoreResult<()> {
        self.enter()?;
        let parsed = parse_range(range)?;
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .get_mut(&parsed.sheet)
            .ok_or_else(|| unknown_sheet(range))?;
        let bounds = parsed.bounds();
        let (row0, col0) = (index(bounds.first_row), bounds.first_col as usize);
        for (r, cells) in rows.into_iter().enumerate() {
            for (c, value) in cells.into_iter().enumerate() {
                *sheet.cell_mut(row0 + r, col0 + c) = value;
            }
        }
        Ok(())
    }

    async fn append_rows(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> StoreResult<Option<String>> {
        self.enter()?;
        let parsed = parse_range(range)?;
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .get_mut(&parsed.sheet)
            .ok_or_else(|| unknown_sheet(range))?;
        if rows.is_empty() {
            return Ok(None);
        }
        let bounds = parsed.bounds();
        let filled = sheet.trimmed().len();
        let row0 = filled.max(index(bounds.first_row));
        let col0 = bounds.first_col as usize;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let count = rows.len();
        for (r, cells) in rows.into_iter().enumerate() {
            for (c, value) in cells.into_iter().enumerate() {
                *sheet.cell_mut(row0 + r, col0 + c) = value;
            }
        }
        Ok(Some(format!(
            "{}!A{}:{}{}",
            quote_sheet(&parsed.sheet),
            row0 + 1,
            end_column(col0 + width),
            row0 + count
        )))
    }

    async fn clear_range(&self, range: &str) -> StoreResult<()> {
        self.enter()?;
        let parsed = parse_range(range)?;
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .get_mut(&parsed.sheet)
            .ok_or_else(|| unknown_sheet(range))?;
        let bounds = parsed.bounds();
        for (r, row) in sheet.grid.iter_mut().enumerate() {
            let Ok(row_number) = u32::try_from(r + 1) else {
                break;
            };
            if !bounds.contains_row(row_number) {
                continue;
            }
            for (c, cell) in row.iter_mut().enumerate() {
                if u32::try_from(c).is_ok_and(|c| bounds.contains_col(c)) {
                    cell.clear();
                }
            }
        }
        Ok(())
    }

    async fn batch_delete_rows(&self, sheet_id: i64, start: u32, end: u32) -> StoreResult<()> {
        self.enter()?;
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .values_mut()
            .find(|s| s.id == sheet_id)
            .ok_or_else(|| StoreError::Upstream(format!("No grid with id: {sheet_id}")))?;
        let len = sheet.grid.len();
        let start = (start as usize).min(len);
        let end = (end as usize).clamp(start, len);
        sheet.grid.drain(start..end);
        Ok(())
    }

    async fn sheet_id(&self, sheet: &str) -> StoreResult<Option<i64>> {
        self.enter()?;
        Ok(self.sheets.lock().await.get(sheet).map(|s| s.id))
    }

    async fn check_connection(&self) -> StoreResult<ConnectionReport> {
        self.enter()?;
        Ok(ConnectionReport {
            title: self.title.clone(),
            sheet_count: self.sheets.lock().await.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_are_ragged_and_trimmed() {
        let fake = FakeSheets::new().with_sheet(
            "S",
            vec![vec!["NRP", "Nama", ""], vec!["001", "", ""], vec!["", "", ""]],
        );
        let rows = fake.get_range("S!A2:B").await.expect("read");
        assert_eq!(rows, vec![vec![Value::String("001".into())]]);
        let header = fake.get_range("S!1:1").await.expect("header");
        assert_eq!(header[0].len(), 2);
    }

    #[tokio::test]
    async fn append_lands_after_last_filled_row() {
        let fake = FakeSheets::new().with_sheet("S", vec![vec!["NRP"], vec!["001"]]);
        let updated = fake
            .append_rows("S!A2:A", vec![vec!["002".into()], vec!["003".into()]])
            .await
            .expect("append");
        assert_eq!(updated.as_deref(), Some("S!A3:A4"));
        assert_eq!(fake.snapshot("S").await.expect("sheet").len(), 4);
    }

    #[tokio::test]
    async fn first_sheet_has_id_zero_and_unknown_sheets_fail() {
        let fake = FakeSheets::new().with_sheet("S", Vec::<Vec<&str>>::new());
        assert_eq!(fake.sheet_id("S").await.expect("id"), Some(0));
        assert_eq!(fake.sheet_id("T").await.expect("id"), None);
        let err = fake.get_range("T!A1").await.expect_err("unknown");
        assert_eq!(err.kind(), crate::ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn offline_mode_fails_every_call() {
        let fake = FakeSheets::new().with_sheet("S", vec![vec!["NRP"]]);
        fake.set_offline(true);
        assert!(fake.check_connection().await.is_err());
        assert_eq!(fake.call_count(), 1);
    }
}
