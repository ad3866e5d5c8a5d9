// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Router assembly and the three listeners the daemon serves
//! concurrently: the main HTTP+WS port (`server.http_port`, default
//! 9529), the standalone plain-WebSocket port (`server.ws_port`,
//! default 9876), and the status port (`server.status_port`, default
//! 9875, served by [`crate::status`]).
//!
//! Grounded in the teacher's `server.rs` route table and middleware
//! stack (`Router::new().route(...)`, `TraceLayer`, `CorsLayer`), with
//! the teacher's single-fallible `start_server` replaced: spec §6
//! requires that a bind failure on any one of the three listeners be
//! logged and leave the other two running, so each listener here owns
//! its own bind attempt the same way [`crate::status::serve`] already
//! does; [`crate::run_daemon`] joins all three rather than returning on
//! the first error.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::http;
use crate::state::AppState;

/// Builds the full `/api/v1/*` + `/health` + `/ws` router.
///
/// CORS is left permissive: this daemon is a local, single-user
/// automation service with no browser-facing deployment story in scope
/// (unlike the teacher's CORS-configurable public-facing server).
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::health::health))
        .route("/api/v1/status", get(http::health::status))
        .route("/api/v1/config", get(http::config::get_config).post(http::config::update_config))
        .route(
            "/api/v1/pipelines",
            get(http::pipelines::list).post(http::pipelines::create),
        )
        .route(
            "/api/v1/pipelines/{id}",
            get(http::pipelines::get).put(http::pipelines::update).delete(http::pipelines::delete),
        )
        .route("/api/v1/pipelines/{id}/run", post(http::pipelines::run))
        .route("/api/v1/pipelines/{id}/run-from/{nodeId}", post(http::pipelines::run_from))
        .route("/api/v1/nodes/catalog", get(http::nodes::catalog))
        .route(
            "/api/v1/episodes",
            get(http::episodes::list).post(http::episodes::create),
        )
        .route(
            "/api/v1/episodes/{id}",
            get(http::episodes::get).put(http::episodes::update).delete(http::episodes::delete),
        )
        .route("/api/v1/episodes/{id}/build-pipeline", post(http::episodes::build_pipeline))
        .route("/api/v1/episodes/{id}/generate", post(http::episodes::generate))
        .route("/api/v1/execute", post(http::execute::execute))
        .route("/api/v1/files/{*rel}", get(http::files::serve_file))
        .route("/ws", get(ws_upgrade_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ws_upgrade_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_axum_socket(socket, state))
}

async fn handle_axum_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();

    let incoming = stream.filter_map(|msg| async move {
        match msg {
            Ok(Message::Text(text)) => Some(Ok::<String, axum::Error>(text.to_string())),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        }
    });
    let outgoing = sink.with(|text: String| async move { Ok::<_, axum::Error>(Message::Text(text.into())) });

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(crate::websocket::run_writer(rx, outgoing));
    crate::websocket::run_session(incoming, tx, state).await;
}

/// Runs the main HTTP+WS listener until the process exits. Logs and
/// returns on a bind failure rather than propagating it, matching
/// [`crate::status::serve`].
pub async fn serve_http(addr: SocketAddr, state: AppState) -> Result<(), Infallible> {
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!(%addr, "http listener bound");
            if let Err(err) = axum::serve(listener, router(state)).await {
                tracing::error!(%addr, error = %err, "http listener exited with an error");
            }
        }
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind http listener");
        }
    }
    Ok(())
}

/// Runs the standalone plain-WebSocket listener, accepting raw TCP
/// connections and speaking the exact same frame protocol as `/ws` on
/// the main port via [`crate::websocket::run_session`]/`run_writer`.
/// Each accepted connection is handled on its own task so one slow
/// handshake never blocks the accept loop.
pub async fn serve_ws(addr: SocketAddr, state: AppState) -> Result<(), Infallible> {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind standalone ws listener");
            return Ok(());
        }
    };
    tracing::info!(%addr, "standalone ws listener bound");

    loop {
        let (tcp, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!(%addr, error = %err, "standalone ws listener accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_tungstenite_connection(tcp, state).await {
                tracing::warn!(%peer_addr, error = %err, "standalone ws connection ended with an error");
            }
        });
    }
}

async fn handle_tungstenite_connection(
    tcp: TcpStream,
    state: AppState,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    use tokio_tungstenite::tungstenite::Message as TMessage;

    let ws_stream = tokio_tungstenite::accept_async(tcp).await?;
    let (sink, stream) = ws_stream.split();

    let incoming = stream.filter_map(|msg| async move {
        match msg {
            Ok(TMessage::Text(text)) => Some(Ok::<String, tokio_tungstenite::tungstenite::Error>(text.to_string())),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        }
    });
    let outgoing = sink.with(|text: String| async move {
        Ok::<_, tokio_tungstenite::tungstenite::Error>(TMessage::Text(text.into()))
    });

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(crate::websocket::run_writer(rx, outgoing));
    crate::websocket::run_session(incoming, tx, state).await;
    Ok(())
}
