// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use rollcall_server::{build_router, validate_startup_config, AppState, ClusterRunner, ServerConfig};
use rollcall_store::{store_from_env, ENV_FAKE_BACKEND};
use std::env;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_u64(name, default_ms))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn server_config_from_env() -> ServerConfig {
    let defaults = ServerConfig::default();
    ServerConfig {
        bind_addr: env::var("ROLLCALL_BIND").unwrap_or(defaults.bind_addr),
        max_body_bytes: env_usize("ROLLCALL_MAX_BODY_BYTES", defaults.max_body_bytes),
        cluster_command: env::var("ROLLCALL_CLUSTER_COMMAND").ok(),
        cluster_timeout: env_duration_ms("ROLLCALL_CLUSTER_TIMEOUT_MS", defaults.cluster_timeout),
        shutdown_drain: env_duration_ms("ROLLCALL_SHUTDOWN_DRAIN_MS", defaults.shutdown_drain),
        fake_backend: env_bool(ENV_FAKE_BACKEND, defaults.fake_backend),
        log_json: env_bool("ROLLCALL_LOG_JSON", defaults.log_json),
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = server_config_from_env();
    init_tracing(config.log_json);

    let store = store_from_env(config.fake_backend).map_err(|e| e.to_string())?;
    validate_startup_config(&config, store.config())?;

    let runner = match config.cluster_command.as_deref() {
        Some(line) => Some(ClusterRunner::from_command_line(line, config.cluster_timeout)?),
        None => {
            warn!("ROLLCALL_CLUSTER_COMMAND unset; /v1/clusters will answer 503");
            None
        }
    };

    let bind_addr = config.bind_addr.clone();
    let drain = config.shutdown_drain;
    let mut state = AppState::new(store, config);
    if let Some(runner) = runner {
        state = state.with_clusters(runner);
    }
    info!(
        backend = state.store.backend_tag(),
        default_sheet = %state.store.config().default_sheet,
        "record store ready"
    );
    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("rollcall-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            info!(drain_ms = drain.as_millis() as u64, "shutdown requested, draining");
            tokio::time::sleep(drain).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
