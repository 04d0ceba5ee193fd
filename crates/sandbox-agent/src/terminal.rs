//! Terminal proxy.
//!
//! Supervises a PTY-serving child bound to a loopback port and
//! reverse-proxies both plain HTTP and WebSocket upgrades under `/shell*` to
//! it, tapping WebSocket byte traffic to bump the activity timestamp (the
//! "byte flowing through the PTY WebSocket" activity rule). The respawn loop
//! mirrors `world-agent::main::spawn_periodic_gc`'s shape, simplified to a
//! fixed 5s delay — no backoff growth.

use crate::state::AppState;
use anyhow::Context;
use axum::body::{to_bytes, Body};
use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio_tungstenite::tungstenite::Message as WsMessage;

const RESPAWN_DELAY: Duration = Duration::from_secs(5);

/// Owns the respawn loop for the PTY server child. Constructed once at
/// startup and spawned onto its own task; never torn down while the process
/// is alive (the process itself is the supervision boundary).
pub struct TerminalSupervisor {
    port: u16,
    root: PathBuf,
}

impl TerminalSupervisor {
    pub fn new(port: u16, root: PathBuf) -> Self {
        Self { port, root }
    }

    pub async fn supervise(self) {
        loop {
            match self.spawn_child().await {
                Ok(mut child) => {
                    let status = child.wait().await;
                    tracing::warn!(?status, "terminal pty server exited, respawning");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to spawn terminal pty server, retrying");
                }
            }
            tokio::time::sleep(RESPAWN_DELAY).await;
        }
    }

    async fn spawn_child(&self) -> anyhow::Result<Child> {
        let rc_path = self.root.join(".sandbox_shell_rc");
        tokio::fs::write(&rc_path, format!("cd {}\n", self.root.display()))
            .await
            .context("failed to write managed shell rc file")?;

        Command::new("ttyd")
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--interface")
            .arg("127.0.0.1")
            .arg("--writable")
            .arg("bash")
            .arg("--rcfile")
            .arg(&rc_path)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn ttyd")
    }
}

/// `ALL /shell*` handler: proxies both plain HTTP and WebSocket upgrades to
/// the internal PTY server. Disabled entirely in local mode.
pub async fn proxy(State(state): State<AppState>, req: Request<Body>) -> Response {
    if state.config.local_mode {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let is_upgrade = req
        .headers()
        .get(axum::http::header::UPGRADE)
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"websocket"))
        .unwrap_or(false);

    if !is_upgrade {
        return proxy_http(&state, req).await;
    }

    let (mut parts, _body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => {
            let target = format!("ws://127.0.0.1:{}{}", state.config.pty_port, path_and_query);
            let activity = state.activity.clone();
            ws.on_upgrade(move |socket| async move {
                if let Err(e) = proxy_websocket(socket, target, activity).await {
                    tracing::warn!(error = %e, "shell websocket proxy session ended with an error");
                }
            })
        }
        Err(rejection) => rejection.into_response(),
    }
}

async fn proxy_http(state: &AppState, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let url = format!("http://127.0.0.1:{}{}", state.config.pty_port, path_and_query);

    let body_bytes = match to_bytes(body, 64 * 1024 * 1024).await {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                format!("failed to read request body: {e}"),
            )
                .into_response();
        }
    };

    let client = reqwest::Client::new();
    let mut builder = client.request(
        reqwest::Method::from_bytes(parts.method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET),
        &url,
    );
    for (name, value) in parts.headers.iter() {
        if name == axum::http::header::HOST {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    builder = builder.body(body_bytes.to_vec());

    match builder.send().await {
        Ok(upstream) => {
            let status = upstream.status();
            let headers = upstream.headers().clone();
            let bytes = upstream.bytes().await.unwrap_or_default();
            let mut response = Response::builder().status(status.as_u16());
            for (name, value) in headers.iter() {
                response = response.header(name.as_str(), value.as_bytes());
            }
            response
                .body(Body::from(bytes))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to reach terminal pty server");
            (StatusCode::BAD_GATEWAY, "terminal backend unavailable").into_response()
        }
    }
}

async fn proxy_websocket(
    client_socket: WebSocket,
    target: String,
    activity: std::sync::Arc<sandbox_common::ActivityMonitor>,
) -> anyhow::Result<()> {
    let (upstream, _response) = tokio_tungstenite::connect_async(&target)
        .await
        .context("failed to connect to terminal pty server")?;

    let (mut client_tx, mut client_rx) = client_socket.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let activity_a = activity.clone();
    let client_to_upstream = async move {
        while let Some(Ok(msg)) = client_rx.next().await {
            activity_a.touch();
            let forwarded = match msg {
                AxumMessage::Text(t) => Some(WsMessage::Text(t)),
                AxumMessage::Binary(b) => Some(WsMessage::Binary(b)),
                AxumMessage::Ping(p) => Some(WsMessage::Ping(p)),
                AxumMessage::Pong(p) => Some(WsMessage::Pong(p)),
                AxumMessage::Close(_) => None,
            };
            let Some(forwarded) = forwarded else { break };
            if upstream_tx.send(forwarded).await.is_err() {
                break;
            }
        }
    };

    let activity_b = activity.clone();
    let upstream_to_client = async move {
        while let Some(Ok(msg)) = upstream_rx.next().await {
            activity_b.touch();
            let forwarded = match msg {
                WsMessage::Text(t) => Some(AxumMessage::Text(t)),
                WsMessage::Binary(b) => Some(AxumMessage::Binary(b)),
                WsMessage::Ping(p) => Some(AxumMessage::Ping(p)),
                WsMessage::Pong(p) => Some(AxumMessage::Pong(p)),
                WsMessage::Close(_) | WsMessage::Frame(_) => None,
            };
            let Some(forwarded) = forwarded else { break };
            if client_tx.send(forwarded).await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {},
        _ = upstream_to_client => {},
    }

    Ok(())
}
