// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! HTTP surface over [`RecordStore`]: record CRUD on `/v1/records`, feature
//! extraction on `/v1/features` and cluster delegation on `/v1/clusters`.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use rollcall_store::RecordStore;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

mod clustering;
mod config;
mod http;
mod middleware;

pub use clustering::{ClusterError, ClusterRequest, ClusterResponse, ClusterRunner};
pub use config::{validate_startup_config, ServerConfig};

pub const CRATE_NAME: &str = "rollcall-server";

#[derive(Clone)]
pub struct AppState {
    pub store: RecordStore,
    pub config: Arc<ServerConfig>,
    pub clusters: Option<Arc<ClusterRunner>>,
    pub request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(store: RecordStore, config: ServerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clusters: None,
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }

    #[must_use]
    pub fn with_clusters(mut self, runner: ClusterRunner) -> Self {
        self.clusters = Some(Arc::new(runner));
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route(
            "/v1/records",
            get(http::records::get_records_handler)
                .post(http::records::post_records_handler)
                .put(http::records::put_records_handler)
                .delete(http::records::delete_records_handler)
                .head(http::records::head_records_handler),
        )
        .route("/v1/features", get(http::handlers::features_handler))
        .route("/v1/clusters", post(http::handlers::clusters_handler))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state)
}
