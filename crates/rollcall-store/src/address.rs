// SPDX-License-Identifier: Apache-2.0

//! A1 notation: building ranges from logical positions and reading them back.

use rollcall_model::{split_sheet_ref, RowNumber, ValidationError, FIRST_DATA_ROW, HEADER_ROW};

/// Bijective base-26 column name for a zero-based column index
/// (`0 -> A`, `25 -> Z`, `26 -> AA`, `701 -> ZZ`, `702 -> AAA`).
#[must_use]
pub fn column_letters(index: u32) -> String {
    let mut n = u64::from(index) + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Inverse of [`column_letters`]. Case-insensitive; `None` for anything
/// that is not a non-empty run of ASCII letters.
#[must_use]
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let mut n: u64 = 0;
    for b in letters.bytes() {
        n = n * 26 + u64::from(b.to_ascii_uppercase() - b'A' + 1);
        if n > u64::from(u32::MAX) {
            return None;
        }
    }
    u32::try_from(n - 1).ok()
}

/// Last column letter for a table `width` columns wide. A zero width still
/// addresses column `A`.
#[must_use]
pub fn end_column(width: usize) -> String {
    let last = u32::try_from(width.saturating_sub(1)).unwrap_or(u32::MAX);
    column_letters(last)
}

/// Sheet name as it must appear before `!`. Names made only of ASCII
/// letters, digits, `_`, `-` and `.` stay bare; anything else is single
/// quoted with embedded quotes doubled.
#[must_use]
pub fn quote_sheet(sheet: &str) -> String {
    let bare = !sheet.is_empty()
        && sheet
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if bare {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

#[must_use]
pub fn header_range(sheet: &str) -> String {
    format!("{q}!{HEADER_ROW}:{HEADER_ROW}", q = quote_sheet(sheet))
}

#[must_use]
pub fn row_range(sheet: &str, row: RowNumber, width: usize) -> String {
    let r = row.get();
    format!("{}!A{r}:{}{r}", quote_sheet(sheet), end_column(width))
}

/// `count` consecutive rows starting at `first_row`.
#[must_use]
pub fn rows_range(sheet: &str, first_row: u32, count: usize, width: usize) -> String {
    let count = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
    let last_row = first_row.saturating_add(count - 1);
    format!(
        "{}!A{first_row}:{}{last_row}",
        quote_sheet(sheet),
        end_column(width)
    )
}

/// Every data row, open-ended downwards.
#[must_use]
pub fn data_range(sheet: &str, width: usize) -> String {
    format!(
        "{}!A{FIRST_DATA_ROW}:{}",
        quote_sheet(sheet),
        end_column(width)
    )
}

/// Header row plus all data rows.
#[must_use]
pub fn table_range(sheet: &str, width: usize) -> String {
    format!("{}!A{HEADER_ROW}:{}", quote_sheet(sheet), end_column(width))
}

/// One corner of a range. Either part may be absent (`A`, `5`) but not both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    /// Zero-based column index.
    pub col: Option<u32>,
    /// One-based row number.
    pub row: Option<u32>,
}

impl CellRef {
    fn parse(input: &str) -> Option<Self> {
        let s = input.trim().trim_start_matches('$');
        let split = s.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(s.len());
        let (letters, rest) = s.split_at(split);
        let digits = rest.trim_start_matches('$');
        let col = if letters.is_empty() {
            None
        } else {
            Some(column_index(letters)?)
        };
        let row = if digits.is_empty() {
            None
        } else {
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let row: u32 = digits.parse().ok()?;
            if row == 0 {
                return None;
            }
            Some(row)
        };
        if col.is_none() && row.is_none() {
            return None;
        }
        Some(Self { col, row })
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(col) = self.col {
            f.write_str(&column_letters(col))?;
        }
        if let Some(row) = self.row {
            write!(f, "{row}")?;
        }
        Ok(())
    }
}

/// Inclusive cell rectangle, open where a bound is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub first_row: u32,
    pub last_row: Option<u32>,
    pub first_col: u32,
    pub last_col: Option<u32>,
}

impl Bounds {
    #[must_use]
    pub fn contains_row(&self, row: u32) -> bool {
        row >= self.first_row && self.last_row.map_or(true, |last| row <= last)
    }

    #[must_use]
    pub fn contains_col(&self, col: u32) -> bool {
        col >= self.first_col && self.last_col.map_or(true, |last| col <= last)
    }
}

/// A parsed `Sheet!A1:B2` reference. A missing cell part means the whole sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: String,
    pub start: Option<CellRef>,
    pub end: Option<CellRef>,
}

impl A1Range {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError("range must not be empty".to_string()));
        }
        let invalid = || ValidationError(format!("invalid range {trimmed:?}"));
        let (sheet, cells) = split_sheet_ref(trimmed).ok_or_else(invalid)?;
        if sheet.trim().is_empty() {
            return Err(ValidationError(format!(
                "range {trimmed:?} must name a sheet"
            )));
        }
        let (start, end) = match cells {
            None => (None, None),
            Some(cells) => {
                let (a, b) = match cells.split_once(':') {
                    Some((a, b)) => (a, Some(b)),
                    None => (cells, None),
                };
                let start = CellRef::parse(a).ok_or_else(invalid)?;
                let end = match b {
                    Some(b) => CellRef::parse(b).ok_or_else(invalid)?,
                    None => start,
                };
                (Some(start), Some(end))
            }
        };
        Ok(Self { sheet, start, end })
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let start = self.start.unwrap_or(CellRef { col: None, row: None });
        let end = self.end.unwrap_or(CellRef { col: None, row: None });
        Bounds {
            first_row: start.row.unwrap_or(1),
            last_row: end.row,
            first_col: start.col.unwrap_or(0),
            last_col: end.col,
        }
    }

    /// True when the range touches the header row.
    #[must_use]
    pub fn covers_header(&self) -> bool {
        self.bounds().first_row <= HEADER_ROW
    }
}

impl std::fmt::Display for A1Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&quote_sheet(&self.sheet))?;
        if let (Some(start), Some(end)) = (self.start, self.end) {
            write!(f, "!{start}")?;
            if end != start {
                write!(f, ":{end}")?;
            }
        }
        Ok(())
    }
}
