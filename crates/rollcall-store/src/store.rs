// SPDX-License-Identifier: Apache-2.0

use crate::address::{data_range, row_range, rows_range, table_range, A1Range};
use crate::codec::{dropped_fields, materialize, record_to_row, row_to_record, CellSource};
use crate::{ConnectionReport, DedupEngine, SchemaResolver, SheetsBackend, StoreError, StoreResult};
use rollcall_model::{
    calculate_features, FeatureSet, IdentityFields, IngestMode, LocatedRecord, Record, RowNumber,
    SchemaPolicy, SheetName, FIRST_DATA_ROW,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DEFAULT_SHEET_NAME: &str = "data-absensi";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Sheet used when a request names none.
    pub default_sheet: String,
    pub schema: SchemaPolicy,
    pub identity: IdentityFields,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_sheet: DEFAULT_SHEET_NAME.to_string(),
            schema: SchemaPolicy::InferFromFirstWrite,
            identity: IdentityFields::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAllOutcome {
    pub headers: Vec<String>,
    pub records: Vec<LocatedRecord>,
    /// Data rows the service returned, blank ones included, before `limit`.
    pub total_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOutcome {
    /// Row the record landed on, when the service reported it.
    pub row: Option<RowNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub mode: IngestMode,
    pub records_written: usize,
    pub duplicates_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClearOutcome {
    Cleared { range: String },
    /// The sheet had no header row, so there was nothing to clear.
    AlreadyEmpty,
}

/// CRUD over one spreadsheet. Cheap to clone; all state lives behind the
/// backend.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn SheetsBackend>,
    schema: SchemaResolver,
    dedup: DedupEngine,
    config: StoreConfig,
}

impl RecordStore {
    #[must_use]
    pub fn new(backend: Arc<dyn SheetsBackend>, config: StoreConfig) -> Self {
        Self {
            schema: SchemaResolver::new(backend.clone(), config.schema.clone()),
            dedup: DedupEngine::new(config.identity.clone()),
            backend,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn backend_tag(&self) -> &'static str {
        self.backend.backend_tag()
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaResolver {
        &self.schema
    }

    /// The named sheet, or the configured default when `raw` is absent or
    /// blank.
    pub fn resolve_sheet(&self, raw: Option<&str>) -> StoreResult<SheetName> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => Ok(SheetName::parse(name)?),
            None => Ok(SheetName::parse(&self.config.default_sheet)?),
        }
    }

    async fn require_headers(&self, sheet: &SheetName) -> StoreResult<Vec<String>> {
        let headers = self.schema.get_headers(sheet.as_str()).await?;
        if headers.is_empty() {
            return Err(StoreError::NotFound(format!(
                "no headers found in sheet '{sheet}'"
            )));
        }
        Ok(headers)
    }

    async fn read_data(
        &self,
        sheet: &SheetName,
        headers: &[String],
    ) -> StoreResult<(Vec<LocatedRecord>, usize)> {
        let rows = self
            .backend
            .get_range(&data_range(sheet.as_str(), headers.len()))
            .await?;
        Ok((materialize(headers, &rows, FIRST_DATA_ROW), rows.len()))
    }

    #[instrument(name = "store_fetch_all", skip(self))]
    pub async fn fetch_all(
        &self,
        sheet: &SheetName,
        limit: Option<usize>,
    ) -> StoreResult<FetchAllOutcome> {
        let headers = self.require_headers(sheet).await?;
        let (mut records, total_rows) = self.read_data(sheet, &headers).await?;
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(FetchAllOutcome {
            headers,
            records,
            total_rows,
        })
    }

    #[instrument(name = "store_fetch_by_row", skip(self))]
    pub async fn fetch_by_row(
        &self,
        sheet: &SheetName,
        row: RowNumber,
    ) -> StoreResult<Option<Record>> {
        let headers = self.require_headers(sheet).await?;
        let rows = self
            .backend
            .get_range(&row_range(sheet.as_str(), row, headers.len()))
            .await?;
        Ok(rows
            .first()
            .map(|cells| row_to_record(&headers, cells))
            .filter(|record| !record.is_blank()))
    }

    /// Every record whose identity field equals `value` exactly.
    #[instrument(name = "store_fetch_by_key", skip(self))]
    pub async fn fetch_by_key(
        &self,
        sheet: &SheetName,
        value: &str,
    ) -> StoreResult<Vec<LocatedRecord>> {
        let headers = self.require_headers(sheet).await?;
        let field = &self.config.identity.identity;
        if !headers.iter().any(|h| h == field) {
            return Err(StoreError::Validation(format!(
                "{field} column not found in sheet headers; cannot search by {field}"
            )));
        }
        let (records, _) = self.read_data(sheet, &headers).await?;
        Ok(records
            .into_iter()
            .filter(|located| located.record.get(field) == value)
            .collect())
    }

    #[instrument(name = "store_append_one", skip(self, record))]
    pub async fn append_one<S>(&self, sheet: &SheetName, record: &S) -> StoreResult<AppendOutcome>
    where
        S: CellSource + Sync + ?Sized,
    {
        if record.is_blank() {
            return Err(StoreError::Validation("no data provided to add".to_string()));
        }
        let headers = self
            .schema
            .ensure_headers(sheet.as_str(), record.field_names())
            .await?;
        self.log_dropped(sheet, &headers, record);
        let row = record_to_row(&headers, record);
        if is_empty_row(&row) {
            return Err(no_matching_fields(sheet));
        }
        let updated = self
            .backend
            .append_rows(&table_range(sheet.as_str(), headers.len()), vec![row])
            .await?;
        let row = match updated {
            Some(range) => landing_row(&range)?,
            None => None,
        };
        info!(sheet = %sheet, row = ?row.map(RowNumber::get), "record appended");
        Ok(AppendOutcome { row })
    }

    /// Replace clears every data row before writing; append skips records
    /// whose identity key already exists in the sheet.
    #[instrument(name = "store_append_bulk", skip(self, records), fields(batch = records.len()))]
    pub async fn append_bulk<T>(
        &self,
        sheet: &SheetName,
        records: Vec<T>,
        mode: IngestMode,
    ) -> StoreResult<BulkOutcome>
    where
        T: CellSource + Send + Sync,
    {
        if records.is_empty() {
            return Err(StoreError::Validation("no data provided to add".to_string()));
        }
        let submitted = records.len();
        let records: Vec<T> = records.into_iter().filter(|r| !r.is_blank()).collect();
        let Some(first) = records.first() else {
            return Err(StoreError::Validation(
                "every record in the batch is blank".to_string(),
            ));
        };
        let headers = self
            .schema
            .ensure_headers(sheet.as_str(), first.field_names())
            .await?;
        // Rows with no cell under any header would be invisible to reads.
        let records: Vec<T> = records
            .into_iter()
            .filter(|r| !is_empty_row(&record_to_row(&headers, r)))
            .collect();
        if records.is_empty() {
            return Err(no_matching_fields(sheet));
        }
        if records.len() < submitted {
            let dropped = submitted - records.len();
            debug!(sheet = %sheet, dropped, "blank records were not written");
        }
        let width = headers.len();
        let outcome = match mode {
            IngestMode::Replace => {
                self.backend
                    .clear_range(&data_range(sheet.as_str(), width))
                    .await?;
                let rows: Vec<Vec<String>> = records
                    .iter()
                    .map(|r| {
                        self.log_dropped(sheet, &headers, r);
                        record_to_row(&headers, r)
                    })
                    .collect();
                let written = rows.len();
                self.backend
                    .update_range(&rows_range(sheet.as_str(), FIRST_DATA_ROW, written, width), rows)
                    .await?;
                BulkOutcome {
                    mode,
                    records_written: written,
                    duplicates_skipped: 0,
                }
            }
            IngestMode::Append => {
                let (existing, _) = self.read_data(sheet, &headers).await?;
                let existing: Vec<Record> = existing.into_iter().map(|l| l.record).collect();
                let filtered = self.dedup.filter_new(&existing, records);
                let rows: Vec<Vec<String>> = filtered
                    .fresh
                    .iter()
                    .map(|r| {
                        self.log_dropped(sheet, &headers, r);
                        record_to_row(&headers, r)
                    })
                    .collect();
                let written = rows.len();
                if written > 0 {
                    self.backend
                        .append_rows(&table_range(sheet.as_str(), width), rows)
                        .await?;
                }
                BulkOutcome {
                    mode,
                    records_written: written,
                    duplicates_skipped: filtered.duplicates_skipped,
                }
            }
        };
        info!(
            sheet = %sheet,
            mode = mode.as_str(),
            written = outcome.records_written,
            skipped = outcome.duplicates_skipped,
            "bulk ingest finished"
        );
        Ok(outcome)
    }

    /// Overwrites the row across the full header width; fields missing
    /// from `record` become empty cells. Returns the row as written.
    #[instrument(name = "store_update_by_row", skip(self, record))]
    pub async fn update_by_row<S>(
        &self,
        sheet: &SheetName,
        row: RowNumber,
        record: &S,
    ) -> StoreResult<Record>
    where
        S: CellSource + Sync + ?Sized,
    {
        if record.is_blank() {
            return Err(StoreError::Validation(
                "no data provided to update; use delete to remove a row".to_string(),
            ));
        }
        let headers = self.require_headers(sheet).await?;
        self.log_dropped(sheet, &headers, record);
        let cells = record_to_row(&headers, record);
        if is_empty_row(&cells) {
            return Err(no_matching_fields(sheet));
        }
        let written: Record = headers.iter().cloned().zip(cells.iter().cloned()).collect();
        self.backend
            .update_range(&row_range(sheet.as_str(), row, headers.len()), vec![cells])
            .await?;
        info!(sheet = %sheet, row = row.get(), "row updated");
        Ok(written)
    }

    /// Structural delete: rows below `row` move up by one.
    #[instrument(name = "store_delete_by_row", skip(self))]
    pub async fn delete_by_row(&self, sheet: &SheetName, row: RowNumber) -> StoreResult<()> {
        let sheet_id = self
            .backend
            .sheet_id(sheet.as_str())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("sheet '{sheet}' not found")))?;
        self.backend
            .batch_delete_rows(sheet_id, row.zero_based(), row.get())
            .await?;
        info!(sheet = %sheet, sheet_id, row = row.get(), "row deleted");
        Ok(())
    }

    /// Blanks the cells of a caller-supplied A1 range.
    #[instrument(name = "store_clear_range", skip(self))]
    pub async fn clear_range(&self, range: &str) -> StoreResult<ClearOutcome> {
        let parsed = A1Range::parse(range)?;
        SheetName::parse(&parsed.sheet)?;
        let normalized = parsed.to_string();
        self.backend.clear_range(&normalized).await?;
        info!(range = %normalized, "range cleared");
        Ok(ClearOutcome::Cleared { range: normalized })
    }

    /// Blanks every data row, keeping the header.
    #[instrument(name = "store_clear_sheet", skip(self))]
    pub async fn clear_sheet(&self, sheet: &SheetName) -> StoreResult<ClearOutcome> {
        let headers = self.schema.get_headers(sheet.as_str()).await?;
        if headers.is_empty() {
            return Ok(ClearOutcome::AlreadyEmpty);
        }
        let range = data_range(sheet.as_str(), headers.len());
        self.backend.clear_range(&range).await?;
        info!(sheet = %sheet, "sheet data cleared");
        Ok(ClearOutcome::Cleared { range })
    }

    pub async fn check_connection(&self) -> StoreResult<ConnectionReport> {
        self.backend.check_connection().await
    }

    /// Per-personnel attendance features over every record in the sheet.
    #[instrument(name = "store_features", skip(self))]
    pub async fn features(&self, sheet: &SheetName) -> StoreResult<Vec<FeatureSet>> {
        let outcome = self.fetch_all(sheet, None).await?;
        let records: Vec<Record> = outcome.records.into_iter().map(|l| l.record).collect();
        Ok(calculate_features(&records))
    }

    fn log_dropped<S>(&self, sheet: &SheetName, headers: &[String], record: &S)
    where
        S: CellSource + ?Sized,
    {
        let dropped = dropped_fields(headers, record);
        if !dropped.is_empty() {
            debug!(sheet = %sheet, fields = ?dropped, "fields without a column were not written");
        }
    }
}

fn is_empty_row(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

fn no_matching_fields(sheet: &SheetName) -> StoreError {
    StoreError::Validation(format!(
        "record has no values for any column of sheet '{sheet}'"
    ))
}

/// First row of a reported `Sheet!A5:C5` range.
fn landing_row(range: &str) -> StoreResult<Option<RowNumber>> {
    let parsed = A1Range::parse(range)
        .map_err(|e| StoreError::Parse(format!("unreadable updated range {range:?}: {e}")))?;
    Ok(parsed
        .start
        .and_then(|start| start.row)
        .and_then(|row| RowNumber::new(row).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_row_reads_first_row_of_reply() {
        assert_eq!(
            landing_row("'data absensi'!A7:N7").expect("range").map(RowNumber::get),
            Some(7)
        );
        assert!(landing_row("'broken").is_err());
    }

    #[test]
    fn blank_sheet_parameter_falls_back_to_default() {
        let store = RecordStore::new(Arc::new(crate::FakeSheets::new()), StoreConfig::default());
        assert_eq!(
            store.resolve_sheet(Some("  ")).expect("sheet").as_str(),
            DEFAULT_SHEET_NAME
        );
        assert_eq!(store.resolve_sheet(Some("rekap")).expect("sheet").as_str(), "rekap");
    }
}
