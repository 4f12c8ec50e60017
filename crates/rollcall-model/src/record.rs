// SPDX-License-Identifier: Apache-2.0

use crate::RowNumber;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One logical row keyed by field name. Every value is text; a missing
/// field reads as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, String>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(IndexMap::with_capacity(capacity))
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map_or("", String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when no field carries any non-whitespace text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.values().all(|v| v.trim().is_empty())
    }

    #[must_use]
    pub fn into_inner(self) -> IndexMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<IndexMap<String, String>> for Record {
    fn from(value: IndexMap<String, String>) -> Self {
        Self(value)
    }
}

/// A record together with the sheet row it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedRecord {
    pub row: RowNumber,
    pub record: Record,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reads_as_empty() {
        let r: Record = [("NRP", "001")].into_iter().collect();
        assert_eq!(r.get("NRP"), "001");
        assert_eq!(r.get("Nama"), "");
    }

    #[test]
    fn blank_detection_ignores_whitespace() {
        let blank: Record = [("NRP", " "), ("Nama", "")].into_iter().collect();
        assert!(blank.is_blank());
        let filled: Record = [("NRP", ""), ("Nama", "A")].into_iter().collect();
        assert!(!filled.is_blank());
    }

    #[test]
    fn serializes_in_insertion_order() {
        let r: Record = [("Nama", "A"), ("NRP", "001")].into_iter().collect();
        let text = serde_json::to_string(&r).expect("json");
        assert_eq!(text, r#"{"Nama":"A","NRP":"001"}"#);
    }
}
