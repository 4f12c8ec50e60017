// SPDX-License-Identifier: Apache-2.0

use crate::address::{end_column, header_range, quote_sheet};
use crate::codec::value_text;
use crate::{SheetsBackend, StoreError, StoreResult};
use rollcall_model::{SchemaPolicy, HEADER_ROW};
use std::sync::Arc;
use tracing::info;

/// Reads row 1 of a sheet, writing it first when a write needs a schema
/// the sheet does not have yet.
#[derive(Clone)]
pub struct SchemaResolver {
    backend: Arc<dyn SheetsBackend>,
    policy: SchemaPolicy,
}

impl SchemaResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn SheetsBackend>, policy: SchemaPolicy) -> Self {
        Self { backend, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &SchemaPolicy {
        &self.policy
    }

    /// Header names in column order; empty when row 1 is blank.
    pub async fn get_headers(&self, sheet: &str) -> StoreResult<Vec<String>> {
        let rows = self.backend.get_range(&header_range(sheet)).await?;
        let mut headers: Vec<String> = rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(value_text)
            .collect();
        while headers.last().is_some_and(|h| h.trim().is_empty()) {
            headers.pop();
        }
        Ok(headers)
    }

    /// Existing headers, or the policy's bootstrap list written to row 1.
    /// Existing headers are never extended with new sample keys.
    pub async fn ensure_headers<'a>(
        &self,
        sheet: &str,
        sample_keys: impl IntoIterator<Item = &'a str>,
    ) -> StoreResult<Vec<String>> {
        let existing = self.get_headers(sheet).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        let headers = self.policy.bootstrap_headers(sample_keys);
        if headers.is_empty() {
            return Err(StoreError::Validation(
                "cannot determine headers for a record with no fields".to_string(),
            ));
        }
        let range = format!(
            "{}!A{HEADER_ROW}:{}{HEADER_ROW}",
            quote_sheet(sheet),
            end_column(headers.len())
        );
        self.backend
            .update_range(&range, vec![headers.clone()])
            .await?;
        info!(sheet, columns = headers.len(), "bootstrapped header row");
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FakeSheets;

    #[tokio::test]
    async fn trailing_blank_header_cells_are_ignored() {
        let fake = Arc::new(FakeSheets::new().with_sheet("S", vec![vec!["NRP", "Nama", " "]]));
        let resolver = SchemaResolver::new(fake, SchemaPolicy::InferFromFirstWrite);
        assert_eq!(resolver.get_headers("S").await.expect("headers"), vec!["NRP", "Nama"]);
    }

    #[tokio::test]
    async fn declared_policy_bootstraps_configured_fields() {
        let fake = Arc::new(FakeSheets::new().with_sheet("S", Vec::<Vec<&str>>::new()));
        let policy = SchemaPolicy::declared(["NRP", "Nama", "Status"]).expect("policy");
        let resolver = SchemaResolver::new(fake.clone(), policy);
        let headers = resolver.ensure_headers("S", ["Nama"]).await.expect("headers");
        assert_eq!(headers, vec!["NRP", "Nama", "Status"]);
        assert_eq!(
            fake.snapshot("S").await.expect("sheet"),
            vec![vec!["NRP".to_string(), "Nama".to_string(), "Status".to_string()]]
        );
    }

    #[tokio::test]
    async fn existing_headers_are_not_extended() {
        let fake = Arc::new(FakeSheets::new().with_sheet("S", vec![vec!["NRP"]]));
        let resolver = SchemaResolver::new(fake, SchemaPolicy::InferFromFirstWrite);
        let headers = resolver.ensure_headers("S", ["NRP", "Extra"]).await.expect("headers");
        assert_eq!(headers, vec!["NRP"]);
    }
}
