// SPDX-License-Identifier: Apache-2.0

use rollcall_model::ValidationError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    Configuration,
    Validation,
    NotFound,
    Upstream,
    Parse,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::Validation => "validation_error",
            Self::NotFound => "not_found",
            Self::Upstream => "upstream_error",
            Self::Parse => "parse_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exactly one failure kind per operation, with a human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Credentials or identifiers missing or malformed.
    Configuration(String),
    /// Caller input failed a precondition; nothing was sent upstream.
    Validation(String),
    /// Well-formed request whose target does not exist.
    NotFound(String),
    /// The spreadsheet service call failed (network, auth, quota).
    Upstream(String),
    /// The spreadsheet service replied with something unreadable.
    Parse(String),
}

impl StoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Parse(_) => ErrorKind::Parse,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(m)
            | Self::Validation(m)
            | Self::NotFound(m)
            | Self::Upstream(m)
            | Self::Parse(m) => m,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for StoreError {}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.0)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
