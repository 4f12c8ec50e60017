// SPDX-License-Identifier: Apache-2.0

use crate::clustering::{ClusterError, ClusterRequest};
use crate::http::response_contract::{store_error_response, Envelope};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

pub(crate) async fn healthz_handler(State(state): State<AppState>) -> Response {
    Envelope::ok(json!({
        "status": "ok",
        "backend": state.store.backend_tag(),
        "defaultSheet": state.store.config().default_sheet,
    }))
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeaturesQuery {
    sheet_name: Option<String>,
}

pub(crate) async fn features_handler(
    State(state): State<AppState>,
    Query(params): Query<FeaturesQuery>,
) -> Response {
    const CONTEXT: &str = "Failed to calculate attendance features";
    let sheet = match state.store.resolve_sheet(params.sheet_name.as_deref()) {
        Ok(sheet) => sheet,
        Err(err) => return store_error_response(&err, CONTEXT).into_response(),
    };
    match state.store.features(&sheet).await {
        Ok(sets) => {
            let count = sets.len();
            Envelope::ok(sets)
                .message(format!("Calculated features for {count} personnel."))
                .into_response()
        }
        Err(err) => store_error_response(&err, CONTEXT).into_response(),
    }
}

pub(crate) async fn clusters_handler(
    State(state): State<AppState>,
    body: Result<Json<ClusterRequest>, JsonRejection>,
) -> Response {
    let Some(runner) = state.clusters.clone() else {
        return Envelope::failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "Clustering is not configured on this server.",
            "unavailable",
        )
        .into_response();
    };
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return Envelope::bad_request("Body must be {\"features\": [[...]], \"k\": n}.")
                .details(rejection.body_text())
                .into_response()
        }
    };
    if let Err(err) = request.validate() {
        return Envelope::bad_request(err.to_string()).into_response();
    }
    match runner.run(&request).await {
        Ok(result) => Envelope::ok(result).into_response(),
        Err(err) => {
            warn!(error = %err, "cluster command failed");
            let status = match err {
                ClusterError::Invalid(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Envelope::failure(status, "Clustering failed.", err.code())
                .details(err.to_string())
                .into_response()
        }
    }
}
