// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Row 1 always holds the field names.
pub const HEADER_ROW: u32 = 1;
pub const FIRST_DATA_ROW: u32 = 2;
pub const SHEET_NAME_MAX_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SheetName(String);

impl SheetName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("sheet name must not be empty".to_string()));
        }
        if s.chars().count() > SHEET_NAME_MAX_LEN {
            return Err(ValidationError(format!(
                "sheet name exceeds max length {SHEET_NAME_MAX_LEN}"
            )));
        }
        if s.chars().any(char::is_control) {
            return Err(ValidationError(
                "sheet name must not contain control characters".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    /// Takes the sheet part of a `Sheet!A1:B2` style parameter, unquoting
    /// `'My Sheet'` forms. An empty sheet part yields `None`.
    pub fn from_range_param(range: &str) -> Result<Option<Self>, ValidationError> {
        let (sheet, _) = split_sheet_ref(range.trim()).ok_or_else(|| {
            ValidationError(format!("unterminated quoted sheet name in range '{range}'"))
        })?;
        if sheet.trim().is_empty() {
            return Ok(None);
        }
        Self::parse(&sheet).map(Some)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Splits `'My ''Sheet'''!A1` into the unquoted sheet and the cell part.
/// A quoted name may contain `!`; an unquoted one ends at its last `!`.
/// Returns `None` for an unterminated quote or text after the closing quote.
#[must_use]
pub fn split_sheet_ref(input: &str) -> Option<(String, Option<&str>)> {
    if let Some(rest) = input.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    name.push('\'');
                    continue;
                }
                let after = &rest[i + 1..];
                return match after.strip_prefix('!') {
                    Some(cells) => Some((name, Some(cells))),
                    None if after.is_empty() => Some((name, None)),
                    None => None,
                };
            }
            name.push(c);
        }
        return None;
    }
    match input.rsplit_once('!') {
        Some((sheet, cells)) => Some((sheet.to_string(), Some(cells))),
        None => Some((input.to_string(), None)),
    }
}

impl Display for SheetName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 1-based data row position. Construction rejects the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(try_from = "u32", into = "u32")]
pub struct RowNumber(u32);

impl RowNumber {
    pub fn new(row: u32) -> Result<Self, ValidationError> {
        if row <= HEADER_ROW {
            return Err(ValidationError(format!(
                "invalid row number {row}: must be greater than {HEADER_ROW} (row {HEADER_ROW} is the header)"
            )));
        }
        Ok(Self(row))
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        let row = s.parse::<u32>().map_err(|_| {
            ValidationError(format!(
                "invalid row number {s:?}: must be a number greater than {HEADER_ROW}"
            ))
        })?;
        Self::new(row)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Zero-based index as used by dimension (structural) requests.
    #[must_use]
    pub const fn zero_based(self) -> u32 {
        self.0 - 1
    }
}

impl TryFrom<u32> for RowNumber {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RowNumber> for u32 {
    fn from(value: RowNumber) -> Self {
        value.0
    }
}

impl Display for RowNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
