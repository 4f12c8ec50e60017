// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const FIELD_NRP: &str = "NRP";
pub const FIELD_NAME: &str = "Nama";
pub const FIELD_UNIT: &str = "Unit";
pub const FIELD_DATE: &str = "Tanggal Absensi";
pub const FIELD_TIME: &str = "Waktu Absensi";
pub const FIELD_STATUS: &str = "Status";
pub const FIELD_KIND: &str = "Jenis Absensi";
pub const FIELD_LATITUDE: &str = "Latitude";
pub const FIELD_LONGITUDE: &str = "Longitude";
pub const FIELD_ACCURACY: &str = "Akurasi Lokasi";
pub const FIELD_PHOTO_URL: &str = "URL Foto";
pub const FIELD_DEVICE_ID: &str = "ID Perangkat";
pub const FIELD_ADDRESS_IP: &str = "Alamat IP";
pub const FIELD_DESCRIPTION: &str = "Deskripsi";

/// Column order of the attendance export.
pub const ATTENDANCE_FIELDS: [&str; 14] = [
    FIELD_NRP,
    FIELD_NAME,
    FIELD_UNIT,
    FIELD_DATE,
    FIELD_TIME,
    FIELD_STATUS,
    FIELD_KIND,
    FIELD_LATITUDE,
    FIELD_LONGITUDE,
    FIELD_ACCURACY,
    FIELD_PHOTO_URL,
    FIELD_DEVICE_ID,
    FIELD_ADDRESS_IP,
    FIELD_DESCRIPTION,
];

/// The two fields whose concatenation identifies an attendance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFields {
    pub identity: String,
    pub date: String,
}

impl Default for IdentityFields {
    fn default() -> Self {
        Self {
            identity: FIELD_NRP.to_string(),
            date: FIELD_DATE.to_string(),
        }
    }
}

/// Where the header row comes from when a sheet has none yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaPolicy {
    /// Write this field list on first use.
    Declared(Vec<String>),
    /// Take the key order of the first record written.
    InferFromFirstWrite,
}

impl SchemaPolicy {
    pub fn declared<I, S>(fields: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields
            .into_iter()
            .map(Into::into)
            .map(|f| f.trim().to_string())
            .collect();
        if fields.is_empty() {
            return Err(ValidationError(
                "declared schema must name at least one field".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if field.is_empty() {
                return Err(ValidationError(
                    "declared schema contains an empty field name".to_string(),
                ));
            }
            if !seen.insert(field.as_str()) {
                return Err(ValidationError(format!(
                    "declared schema repeats field {field:?}"
                )));
            }
        }
        Ok(Self::Declared(fields))
    }

    #[must_use]
    pub fn attendance() -> Self {
        Self::Declared(ATTENDANCE_FIELDS.iter().map(|f| (*f).to_string()).collect())
    }

    /// Header list to bootstrap an empty sheet with. Empty when inference
    /// is selected and the sample has no keys.
    #[must_use]
    pub fn bootstrap_headers<'a>(
        &self,
        sample_keys: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        match self {
            Self::Declared(fields) => fields.clone(),
            Self::InferFromFirstWrite => {
                let mut seen = HashSet::new();
                sample_keys
                    .into_iter()
                    .filter(|k| seen.insert(*k))
                    .map(ToString::to_string)
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Add only records whose identity key is not already present.
    Append,
    /// Clear every data row, then write the batch.
    Replace,
}

impl IngestMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Replace => "replace",
        }
    }

    #[must_use]
    pub const fn from_append_flag(append: bool) -> Self {
        if append {
            Self::Append
        } else {
            Self::Replace
        }
    }
}
