// SPDX-License-Identifier: Apache-2.0

use crate::codec::CellSource;
use rollcall_model::{IdentityFields, Record};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOutcome<T> {
    /// Candidates whose key is absent from the snapshot, in input order.
    pub fresh: Vec<T>,
    pub duplicates_skipped: usize,
}

/// Composite-key filter for append-mode ingestion.
#[derive(Debug, Clone, Default)]
pub struct DedupEngine {
    fields: IdentityFields,
}

impl DedupEngine {
    #[must_use]
    pub fn new(fields: IdentityFields) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &IdentityFields {
        &self.fields
    }

    /// `identity + "_" + date`, each `""` when missing.
    #[must_use]
    pub fn key_of<S: CellSource + ?Sized>(&self, record: &S) -> String {
        format!(
            "{}_{}",
            record.cell_text(&self.fields.identity),
            record.cell_text(&self.fields.date)
        )
    }

    /// Drops candidates whose key already exists in `existing`. Candidates
    /// are compared only against the snapshot, not against each other.
    pub fn filter_new<T>(&self, existing: &[Record], candidates: Vec<T>) -> DedupOutcome<T>
    where
        T: CellSource,
    {
        let known: HashSet<String> = existing.iter().map(|r| self.key_of(r)).collect();
        let total = candidates.len();
        let fresh: Vec<T> = candidates
            .into_iter()
            .filter(|c| !known.contains(&self.key_of(c)))
            .collect();
        DedupOutcome {
            duplicates_skipped: total - fresh.len(),
            fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(nrp: &str, date: &str) -> Record {
        [("NRP", nrp), ("Tanggal Absensi", date)].into_iter().collect()
    }

    #[test]
    fn missing_fields_key_as_empty() {
        let engine = DedupEngine::default();
        let only_nrp: Record = [("NRP", "001")].into_iter().collect();
        assert_eq!(engine.key_of(&only_nrp), "001_");
        assert_eq!(engine.key_of(&Record::new()), "_");
    }

    #[test]
    fn filtering_twice_is_idempotent() {
        let engine = DedupEngine::default();
        let existing = vec![rec("001", "2024-01-01")];
        let batch = vec![rec("001", "2024-01-01"), rec("003", "2024-01-01")];
        let first = engine.filter_new(&existing, batch);
        assert_eq!(first.duplicates_skipped, 1);
        let second = engine.filter_new(&existing, first.fresh.clone());
        assert_eq!(second.fresh, first.fresh);
        assert_eq!(second.duplicates_skipped, 0);
    }

    #[test]
    fn repeats_within_a_batch_are_kept() {
        let engine = DedupEngine::default();
        let out = engine.filter_new(&[], vec![rec("9", "d"), rec("9", "d")]);
        assert_eq!(out.fresh.len(), 2);
    }
}
