// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_store::{ErrorKind, StoreError};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, warn};

/// Every JSON body leaves through this shape:
/// `{data, message?, error?, details?, code?}` plus operation counters.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Envelope {
    #[serde(skip)]
    status: StatusCode,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Envelope {
    pub(crate) fn ok(data: impl Serialize) -> Self {
        Self {
            status: StatusCode::OK,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            message: None,
            error: None,
            details: None,
            code: None,
            extra: Map::new(),
        }
    }

    pub(crate) fn failure(
        status: StatusCode,
        error: impl Into<String>,
        code: &'static str,
    ) -> Self {
        Self {
            status,
            error: Some(error.into()),
            code: Some(code),
            ..Self::ok(Value::Null)
        }
    }

    /// 404 carries a message rather than an error, with `data: null`.
    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: Some(message.into()),
            code: Some(ErrorKind::NotFound.as_str()),
            ..Self::ok(Value::Null)
        }
    }

    pub(crate) fn bad_request(error: impl Into<String>) -> Self {
        Self::failure(
            StatusCode::BAD_REQUEST,
            error,
            ErrorKind::Validation.as_str(),
        )
    }

    #[must_use]
    pub(crate) fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub(crate) fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub(crate) fn with(mut self, key: &str, value: impl Serialize) -> Self {
        self.extra.insert(
            key.to_string(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        );
        self
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[must_use]
pub(crate) fn store_error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Maps a store failure to its envelope. `context` names the failed
/// operation for 5xx bodies; the store's detail goes to `details`.
pub(crate) fn store_error_response(err: &StoreError, context: &str) -> Envelope {
    let status = store_error_status(err.kind());
    match status {
        StatusCode::BAD_REQUEST => Envelope::bad_request(err.message()),
        StatusCode::NOT_FOUND => Envelope::not_found(err.message()),
        _ => {
            if err.kind() == ErrorKind::Configuration {
                error!(kind = %err.kind(), detail = err.message(), "{context}");
            } else {
                warn!(kind = %err.kind(), detail = err.message(), "{context}");
            }
            Envelope::failure(status, context, err.kind().as_str()).details(err.message())
        }
    }
}
