// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Rollcall domain model.
//!
//! Sheet and row addressing types, the string-valued [`Record`], schema
//! policy, and the pure attendance feature extraction that feeds the
//! external clustering step.

mod features;
mod record;
mod schema;
mod sheet;

pub use features::{
    calculate_features, parse_accuracy_meters, parse_clock_minutes, FeatureSet,
    DEFAULT_ACCURACY_METERS, DEFAULT_ARRIVAL_MINUTES, ENTRY_KIND, UNKNOWN_NRP,
};
pub use record::{LocatedRecord, Record};
pub use schema::{
    IdentityFields, IngestMode, SchemaPolicy, ATTENDANCE_FIELDS, FIELD_ACCURACY, FIELD_ADDRESS_IP,
    FIELD_DATE, FIELD_DESCRIPTION, FIELD_DEVICE_ID, FIELD_KIND, FIELD_LATITUDE, FIELD_LONGITUDE,
    FIELD_NAME, FIELD_NRP, FIELD_PHOTO_URL, FIELD_STATUS, FIELD_TIME, FIELD_UNIT,
};
pub use sheet::{
    split_sheet_ref, RowNumber, SheetName, ValidationError, FIRST_DATA_ROW, HEADER_ROW,
    SHEET_NAME_MAX_LEN,
};

pub const CRATE_NAME: &str = "rollcall-model";
