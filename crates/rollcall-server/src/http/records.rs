// SPDX-License-Identifier: Apache-2.0

use crate::http::response_contract::{store_error_response, Envelope};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_model::{IngestMode, RowNumber, SheetName};
use rollcall_store::{ClearOutcome, JsonRecord, StoreError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

const FETCH_FAILED: &str = "Failed to fetch records from the spreadsheet";
const ADD_FAILED: &str = "Failed to add records to the spreadsheet";
const UPDATE_FAILED: &str = "Failed to update the record in the spreadsheet";
const DELETE_FAILED: &str = "Failed to delete data from the spreadsheet";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordsQuery {
    row: Option<String>,
    nrp: Option<String>,
    range: Option<String>,
    sheet_name: Option<String>,
    limit: Option<String>,
    clear_sheet: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordsBody {
    record: Option<Value>,
    data: Option<Value>,
    range: Option<String>,
    sheet_name: Option<String>,
    append_mode: Option<bool>,
}

/// `sheetName` wins over the sheet part of `range`; both absent means the
/// configured default sheet.
fn target_sheet(
    state: &AppState,
    sheet_name: Option<&str>,
    range: Option<&str>,
) -> Result<SheetName, StoreError> {
    if let Some(name) = sheet_name.map(str::trim).filter(|s| !s.is_empty()) {
        return state.store.resolve_sheet(Some(name));
    }
    match range {
        Some(range) => match SheetName::from_range_param(range)? {
            Some(sheet) => Ok(sheet),
            None => state.store.resolve_sheet(None),
        },
        None => state.store.resolve_sheet(None),
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_row(raw: &str) -> Result<RowNumber, Envelope> {
    RowNumber::parse(raw).map_err(|_| {
        Envelope::bad_request("Invalid row number provided. Must be a number greater than 1.")
    })
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Envelope> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => Err(Envelope::bad_request("Request body must be a JSON object.")
            .details(rejection.body_text())),
    }
}

pub(crate) async fn get_records_handler(
    State(state): State<AppState>,
    Query(params): Query<RecordsQuery>,
) -> Response {
    let sheet = match target_sheet(&state, params.sheet_name.as_deref(), params.range.as_deref()) {
        Ok(sheet) => sheet,
        Err(err) => return store_error_response(&err, FETCH_FAILED).into_response(),
    };

    if let Some(raw_row) = present(params.row.as_ref()) {
        let row = match parse_row(raw_row) {
            Ok(row) => row,
            Err(resp) => return resp.into_response(),
        };
        return match state.store.fetch_by_row(&sheet, row).await {
            Ok(Some(record)) => Envelope::ok(record).with("row", row).into_response(),
            Ok(None) => Envelope::not_found(format!("No data found at row {row}.")).into_response(),
            Err(err) => store_error_response(&err, FETCH_FAILED).into_response(),
        };
    }

    if let Some(nrp) = present(params.nrp.as_ref()) {
        return match state.store.fetch_by_key(&sheet, nrp).await {
            Ok(found) if found.is_empty() => {
                Envelope::not_found(format!("No record found with NRP {nrp}.")).into_response()
            }
            Ok(found) => {
                let rows: Vec<u32> = found.iter().map(|l| l.row.get()).collect();
                let records: Vec<_> = found.into_iter().map(|l| l.record).collect();
                Envelope::ok(records).with("rows", rows).into_response()
            }
            Err(err) => store_error_response(&err, FETCH_FAILED).into_response(),
        };
    }

    let limit = present(params.limit.as_ref()).and_then(|l| l.parse::<usize>().ok());
    match state.store.fetch_all(&sheet, limit).await {
        Ok(outcome) => {
            let count = outcome.records.len();
            let records: Vec<_> = outcome.records.into_iter().map(|l| l.record).collect();
            Envelope::ok(records)
                .message(format!("Successfully loaded {count} records."))
                .with("totalAvailableRecords", outcome.total_rows)
                .into_response()
        }
        Err(err) => store_error_response(&err, FETCH_FAILED).into_response(),
    }
}

pub(crate) async fn post_records_handler(
    State(state): State<AppState>,
    body: Result<Json<RecordsBody>, JsonRejection>,
) -> Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp.into_response(),
    };
    let sheet = match target_sheet(&state, body.sheet_name.as_deref(), body.range.as_deref()) {
        Ok(sheet) => sheet,
        Err(err) => return store_error_response(&err, ADD_FAILED).into_response(),
    };

    match (body.data, body.record) {
        (Some(Value::Array(items)), _) => {
            let mut records: Vec<JsonRecord> = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => records.push(map),
                    _ => {
                        return Envelope::bad_request("Every entry in 'data' must be an object.")
                            .into_response()
                    }
                }
            }
            let mode = IngestMode::from_append_flag(body.append_mode.unwrap_or(true));
            match state.store.append_bulk(&sheet, records, mode).await {
                Ok(outcome) => {
                    let message = match mode {
                        IngestMode::Replace => format!(
                            "Successfully replaced data with {} records in {sheet}.",
                            outcome.records_written
                        ),
                        IngestMode::Append if outcome.records_written == 0 => {
                            "No new records to add (all records already exist or match duplicates)."
                                .to_string()
                        }
                        IngestMode::Append => format!(
                            "Successfully appended {} new records to {sheet}.",
                            outcome.records_written
                        ),
                    };
                    Envelope::ok(outcome)
                        .message(message)
                        .with("recordsWritten", outcome.records_written)
                        .with("duplicatesSkipped", outcome.duplicates_skipped)
                        .into_response()
                }
                Err(err) => store_error_response(&err, ADD_FAILED).into_response(),
            }
        }
        (_, Some(Value::Object(record))) => match state.store.append_one(&sheet, &record).await {
            Ok(outcome) => Envelope::ok(json!({"record": record, "row": outcome.row}))
                .message(format!("Successfully added 1 record to {sheet}."))
                .with("recordsWritten", 1)
                .into_response(),
            Err(err) => store_error_response(&err, ADD_FAILED).into_response(),
        },
        _ => Envelope::bad_request(
            "Invalid payload. Expecting 'record' for single entry or 'data' (array) for bulk entries.",
        )
        .into_response(),
    }
}

pub(crate) async fn put_records_handler(
    State(state): State<AppState>,
    Query(params): Query<RecordsQuery>,
    body: Result<Json<RecordsBody>, JsonRejection>,
) -> Response {
    let Some(raw_row) = present(params.row.as_ref()) else {
        return Envelope::bad_request(
            "Row ID (as query parameter ?row=) is required for PUT operation.",
        )
        .into_response();
    };
    let row = match parse_row(raw_row) {
        Ok(row) => row,
        Err(resp) => return resp.into_response(),
    };
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp.into_response(),
    };
    let Some(Value::Object(record)) = body.record else {
        return Envelope::bad_request("Request body must contain a 'record' object.")
            .into_response();
    };
    let sheet = match target_sheet(&state, params.sheet_name.as_deref(), params.range.as_deref()) {
        Ok(sheet) => sheet,
        Err(err) => return store_error_response(&err, UPDATE_FAILED).into_response(),
    };
    match state.store.update_by_row(&sheet, row, &record).await {
        Ok(written) => Envelope::ok(written)
            .message(format!("Record at row {row} in {sheet} updated successfully."))
            .with("row", row)
            .into_response(),
        Err(err) => store_error_response(&err, UPDATE_FAILED).into_response(),
    }
}

pub(crate) async fn delete_records_handler(
    State(state): State<AppState>,
    Query(params): Query<RecordsQuery>,
) -> Response {
    if let Some(raw_row) = present(params.row.as_ref()) {
        let row = match parse_row(raw_row) {
            Ok(row) => row,
            Err(resp) => return resp.into_response(),
        };
        let sheet = match state.store.resolve_sheet(params.sheet_name.as_deref()) {
            Ok(sheet) => sheet,
            Err(err) => return store_error_response(&err, DELETE_FAILED).into_response(),
        };
        return match state.store.delete_by_row(&sheet, row).await {
            Ok(()) => Envelope::ok(json!({"row": row, "sheet": sheet}))
                .message(format!("Row {row} deleted successfully from {sheet}."))
                .into_response(),
            Err(err) => store_error_response(&err, DELETE_FAILED).into_response(),
        };
    }

    if let Some(range) = present(params.range.as_ref()) {
        return match state.store.clear_range(range).await {
            Ok(outcome) => clear_response(outcome, range),
            Err(err) => store_error_response(&err, DELETE_FAILED).into_response(),
        };
    }

    if let Some(raw_sheet) = present(params.clear_sheet.as_ref()) {
        let sheet = match state.store.resolve_sheet(Some(raw_sheet)) {
            Ok(sheet) => sheet,
            Err(err) => return store_error_response(&err, DELETE_FAILED).into_response(),
        };
        return match state.store.clear_sheet(&sheet).await {
            Ok(outcome) => clear_response(outcome, sheet.as_str()),
            Err(err) => store_error_response(&err, DELETE_FAILED).into_response(),
        };
    }

    Envelope::bad_request(
        "Either row ID (?row=), a range (?range=Sheet1!A2:Z), or a sheet name to clear (?clearSheet=Sheet1) is required for DELETE operation.",
    )
    .into_response()
}

fn clear_response(outcome: ClearOutcome, target: &str) -> Response {
    let message = match &outcome {
        ClearOutcome::Cleared { range } => format!("Data cleared successfully from {range}."),
        ClearOutcome::AlreadyEmpty => {
            format!("Sheet '{target}' is already empty or has no headers.")
        }
    };
    Envelope::ok(outcome).message(message).into_response()
}

/// Connection test: status only, reported in `x-connection-status`.
pub(crate) async fn head_records_handler(State(state): State<AppState>) -> Response {
    match state.store.check_connection().await {
        Ok(_) => {
            let mut resp = StatusCode::OK.into_response();
            resp.headers_mut()
                .insert("x-connection-status", HeaderValue::from_static("ok"));
            resp
        }
        Err(err) => {
            warn!(kind = %err.kind(), detail = err.message(), "connection check failed");
            let mut resp = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            resp.headers_mut()
                .insert("x-connection-status", HeaderValue::from_static("error"));
            resp
        }
    }
}
