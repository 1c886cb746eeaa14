//! Relay HTTP + WebSocket server (single port).

use crate::config::{self, Config};
use crate::gateway::dispatch::handle_message;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const PROTOCOL_VERSION: u32 = 1;

/// Shared state for the relay (config and shutdown token). Holds no per-conversation data.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Cancelled once on shutdown; every connection task watches it and closes its socket.
    pub shutdown: CancellationToken,
    /// Upgraded WebSocket tasks; awaited after the listener stops so close frames get out.
    pub connections: TaskTracker,
}

/// Run the relay server; binds to config.server.bind:config.server.port and serves
/// the WebSocket endpoint at config.server.path plus a health probe at `/`.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    run_gateway_with_shutdown(config, shutdown_signal()).await
}

/// Same as [`run_gateway`], but stops when `signal` completes. On shutdown every open
/// connection is sent a close frame, and this returns only after all connection tasks end.
pub async fn run_gateway_with_shutdown<F>(config: Config, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind = config.server.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) {
        log::warn!("relay bound to {} has no authentication; any client can connect", bind);
    }
    let ws_path = if config.server.path.starts_with('/') {
        config.server.path.clone()
    } else {
        format!("/{}", config.server.path)
    };
    anyhow::ensure!(
        ws_path != "/",
        "server.path must not be \"/\" (reserved for the health probe)"
    );

    let shutdown = CancellationToken::new();
    let connections = TaskTracker::new();
    let state = GatewayState {
        config: Arc::new(config.clone()),
        shutdown: shutdown.clone(),
        connections: connections.clone(),
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route(&ws_path, get(ws_handler))
        .with_state(state);

    let bind_addr = format!("{}:{}", bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on ws://{}{}", bind_addr, ws_path);

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            log::info!("shutdown requested, closing connections");
            token.cancel();
        })
        .await
        .context("relay server exited")?;

    // Upgraded sockets outlive axum's graceful shutdown; wait for their close frames.
    shutdown.cancel();
    connections.close();
    connections.wait().await;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "protocol": PROTOCOL_VERSION,
        "port": state.config.server.port,
    }))
}

/// GET <path> upgrades to WebSocket; each text frame is one envelope.
async fn ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    let connections = state.connections.clone();
    ws.on_upgrade(move |socket| connections.track_future(handle_socket(socket, state)))
}

/// One connection: frames are handled strictly in order, each fully answered before the next recv.
async fn handle_socket(mut socket: WebSocket, state: GatewayState) {
    log::info!("a new client connected");
    loop {
        tokio::select! {
            biased;

            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        log::debug!("ws receive error: {}", e);
                        break;
                    }
                    None => break,
                };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let Some(reply) = handle_message(&text) else { continue };
                if let Err(e) = socket.send(Message::Text(reply)).await {
                    log::warn!("failed to send reply: {}", e);
                    break;
                }
            }
        }
    }

    log::info!("client disconnected");
}
