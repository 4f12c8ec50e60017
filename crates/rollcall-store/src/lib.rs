// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! A spreadsheet treated as a table.
//!
//! Row 1 of a sheet holds the field names; every following row is one
//! [`Record`](rollcall_model::Record). [`RecordStore`] layers fetch, search,
//! append, update and delete over a [`SheetsBackend`], which only offers
//! range reads and writes.
//!
//! Consistency: every operation is an independent round trip. There is no
//! locking across calls, so two concurrent append-mode ingests may both miss
//! each other's records and write duplicates, and a structural row delete
//! renumbers every row below it for callers still holding row numbers.
//! Mutations that reached the backend are never rolled back.

pub mod address;
mod backend;
mod bootstrap;
pub mod codec;
mod credentials;
mod dedup;
mod error;
mod fake;
mod google;
mod schema;
mod store;

pub use backend::{CellRows, ConnectionReport, SheetsBackend};
pub use bootstrap::{
    backend_from_lookup, parse_schema_fields, store_config_from_lookup, store_from_env,
    ENV_DATE_FIELD, ENV_DEFAULT_SHEET, ENV_FAKE_BACKEND, ENV_IDENTITY_FIELD, ENV_SCHEMA_FIELDS,
    ENV_VALUE_INPUT,
};
pub use codec::{CellSource, JsonRecord};
pub use credentials::{
    normalize_private_key, SheetsCredentials, ENV_CLIENT_EMAIL, ENV_PRIVATE_KEY,
    ENV_SPREADSHEET_ID,
};
pub use dedup::{DedupEngine, DedupOutcome};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use fake::FakeSheets;
pub use google::{
    GoogleSheetsBackend, ValueInputOption, DEFAULT_API_BASE, DEFAULT_TOKEN_URI, SHEETS_SCOPE,
};
pub use schema::SchemaResolver;
pub use store::{
    AppendOutcome, BulkOutcome, ClearOutcome, FetchAllOutcome, RecordStore, StoreConfig,
    DEFAULT_SHEET_NAME,
};

pub const CRATE_NAME: &str = "rollcall-store";
