// SPDX-License-Identifier: Apache-2.0

use rollcall_model::SheetName;
use rollcall_store::StoreConfig;
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
    /// Command line of the k-means helper; `None` disables `/v1/clusters`.
    pub cluster_command: Option<String>,
    pub cluster_timeout: Duration,
    pub shutdown_drain: Duration,
    pub fake_backend: bool,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_body_bytes: 4 * 1024 * 1024,
            cluster_command: None,
            cluster_timeout: Duration::from_secs(30),
            shutdown_drain: Duration::from_secs(5),
            fake_backend: false,
            log_json: true,
        }
    }
}

pub fn validate_startup_config(server: &ServerConfig, store: &StoreConfig) -> Result<(), String> {
    if server.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    server
        .bind_addr
        .parse::<SocketAddr>()
        .map_err(|e| format!("invalid bind addr {}: {e}", server.bind_addr))?;
    if server
        .cluster_command
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        return Err("cluster command must not be blank when set".to_string());
    }
    if server.cluster_command.is_some() && server.cluster_timeout.is_zero() {
        return Err("cluster timeout must be > 0".to_string());
    }
    SheetName::parse(&store.default_sheet)
        .map_err(|e| format!("invalid default sheet: {e}"))?;
    if store.identity.identity.trim().is_empty() || store.identity.date.trim().is_empty() {
        return Err("identity and date field names must be non-empty".to_string());
    }
    if store.identity.identity == store.identity.date {
        return Err("identity and date fields must differ".to_string());
    }
    Ok(())
}
