// SPDX-License-Identifier: Apache-2.0

//! Row ⇄ record conversion against a header list.

use rollcall_model::{LocatedRecord, Record, RowNumber};
use serde_json::Value;

/// A record as it arrives over the wire: arbitrary JSON scalars per field.
pub type JsonRecord = serde_json::Map<String, Value>;

/// Anything that can be written as one sheet row.
pub trait CellSource {
    /// Text for `field`, `""` when absent.
    fn cell_text(&self, field: &str) -> String;
    fn field_names(&self) -> Vec<&str>;

    /// No field, or only whitespace in every field.
    fn is_blank(&self) -> bool {
        self.field_names()
            .into_iter()
            .all(|f| self.cell_text(f).trim().is_empty())
    }
}

impl CellSource for Record {
    fn cell_text(&self, field: &str) -> String {
        self.get(field).to_string()
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields().collect()
    }
}

impl CellSource for JsonRecord {
    fn cell_text(&self, field: &str) -> String {
        self.get(field).map(value_text).unwrap_or_default()
    }

    fn field_names(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

/// Stringifies one cell. Null is empty, strings are verbatim, numbers and
/// booleans use their JSON text, arrays and objects are serialized JSON.
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Zips headers with a row, padding short rows with `""`. Cells beyond the
/// header width are ignored.
#[must_use]
pub fn row_to_record(headers: &[String], row: &[Value]) -> Record {
    let mut record = Record::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        let text = row.get(i).map(value_text).unwrap_or_default();
        record.insert(header.clone(), text);
    }
    record
}

/// One cell per header, in header order. Total: never fails.
#[must_use]
pub fn record_to_row<S: CellSource + ?Sized>(headers: &[String], source: &S) -> Vec<String> {
    headers.iter().map(|h| source.cell_text(h)).collect()
}

/// Fields of `source` that have no column and will not be written.
#[must_use]
pub fn dropped_fields<'a, S>(headers: &[String], source: &'a S) -> Vec<&'a str>
where
    S: CellSource + ?Sized,
{
    source
        .field_names()
        .into_iter()
        .filter(|f| !headers.iter().any(|h| h == f))
        .collect()
}

/// Decodes consecutive rows starting at `first_row`, skipping blank ones.
#[must_use]
pub fn materialize(headers: &[String], rows: &[Vec<Value>], first_row: u32) -> Vec<LocatedRecord> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let record = row_to_record(headers, row);
            if record.is_blank() {
                return None;
            }
            let offset = u32::try_from(i).ok()?;
            let row = RowNumber::new(first_row.checked_add(offset)?).ok()?;
            Some(LocatedRecord { row, record })
        })
        .collect()
}
