// SPDX-License-Identifier: Apache-2.0

//! Environment-driven assembly of a [`RecordStore`], shared by the server
//! and the CLI.

use crate::{
    FakeSheets, GoogleSheetsBackend, RecordStore, SheetsBackend, SheetsCredentials, StoreConfig,
    StoreError, StoreResult, ValueInputOption,
};
use rollcall_model::{IdentityFields, SchemaPolicy};
use std::sync::Arc;
use tracing::{info, warn};

pub const ENV_DEFAULT_SHEET: &str = "ROLLCALL_DEFAULT_SHEET";
pub const ENV_SCHEMA_FIELDS: &str = "ROLLCALL_SCHEMA_FIELDS";
pub const ENV_IDENTITY_FIELD: &str = "ROLLCALL_IDENTITY_FIELD";
pub const ENV_DATE_FIELD: &str = "ROLLCALL_DATE_FIELD";
pub const ENV_VALUE_INPUT: &str = "ROLLCALL_VALUE_INPUT";
pub const ENV_FAKE_BACKEND: &str = "ROLLCALL_FAKE_BACKEND";

/// `attendance` selects the built-in column set, `infer` or an empty value
/// takes the first write's keys, anything else is a comma-separated list.
pub fn parse_schema_fields(raw: &str) -> Result<SchemaPolicy, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("infer") {
        return Ok(SchemaPolicy::InferFromFirstWrite);
    }
    if raw.eq_ignore_ascii_case("attendance") {
        return Ok(SchemaPolicy::attendance());
    }
    SchemaPolicy::declared(raw.split(',')).map_err(|e| e.to_string())
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn store_config_from_lookup<F>(lookup: F) -> StoreResult<StoreConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = StoreConfig::default();
    let identity_defaults = IdentityFields::default();
    let schema = match lookup(ENV_SCHEMA_FIELDS) {
        Some(raw) => parse_schema_fields(&raw)
            .map_err(|e| StoreError::Configuration(format!("{ENV_SCHEMA_FIELDS}: {e}")))?,
        None => defaults.schema,
    };
    Ok(StoreConfig {
        default_sheet: non_empty(&lookup, ENV_DEFAULT_SHEET).unwrap_or(defaults.default_sheet),
        schema,
        identity: IdentityFields {
            identity: non_empty(&lookup, ENV_IDENTITY_FIELD)
                .unwrap_or(identity_defaults.identity),
            date: non_empty(&lookup, ENV_DATE_FIELD).unwrap_or(identity_defaults.date),
        },
    })
}

/// The in-memory backend when `fake` is set, otherwise Google Sheets with
/// credentials from the lookup.
pub fn backend_from_lookup<F>(
    lookup: F,
    fake: bool,
    default_sheet: &str,
) -> StoreResult<Arc<dyn SheetsBackend>>
where
    F: Fn(&str) -> Option<String>,
{
    if fake {
        warn!(sheet = default_sheet, "using in-memory spreadsheet backend");
        let backend = FakeSheets::new().with_sheet(default_sheet, Vec::<Vec<String>>::new());
        return Ok(Arc::new(backend));
    }
    let value_input = match non_empty(&lookup, ENV_VALUE_INPUT) {
        Some(raw) => ValueInputOption::parse(&raw)
            .map_err(|e| StoreError::Configuration(format!("{ENV_VALUE_INPUT}: {e}")))?,
        None => ValueInputOption::default(),
    };
    let credentials = SheetsCredentials::from_lookup(&lookup)?;
    info!(
        client_email = %credentials.client_email,
        value_input = value_input.as_str(),
        "using google sheets backend"
    );
    let backend = GoogleSheetsBackend::new(credentials)?.with_value_input(value_input);
    Ok(Arc::new(backend))
}

/// Reads every setting from the process environment.
pub fn store_from_env(fake: bool) -> StoreResult<RecordStore> {
    let lookup = |name: &str| std::env::var(name).ok();
    let config = store_config_from_lookup(lookup)?;
    let backend = backend_from_lookup(lookup, fake, &config.default_sheet)?;
    Ok(RecordStore::new(backend, config))
}
