//! WebSocket connection handling
//!
//! One WebSocket per source or viewer. A reader task feeds decoded events to
//! the gateway; a writer task drains the connection's outbound queue and the
//! registry change signal.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::OwnedSemaphorePermit;

use crate::gateway::ServerEvent;
use crate::session::ConnectionContext;

use super::http::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let permit = match state.try_admit() {
        Ok(permit) => permit,
        Err(e) => {
            tracing::warn!(peer = ?connect_info.map(|c| c.0), "Connection rejected: limit reached");
            return e.into_response();
        }
    };

    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let max_message_size = state.max_message_size;

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, peer, permit))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    peer: Option<SocketAddr>,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let gateway = Arc::clone(&state.gateway);
    let ctx = ConnectionContext::new(peer);

    let mut outbound = gateway.connect(&ctx).await;
    let mut changes = gateway.registry().subscribe();
    let (mut sender, mut receiver) = socket.split();

    let connection = ctx.connection.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = outbound.recv() => match event {
                    Some(event) => event,
                    None => {
                        // Detached by the server, e.g. evicted as stale
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                },
                change = changes.recv() => match change {
                    Ok(_) => ServerEvent::ComputersUpdated,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::trace!(connection = %connection, skipped = skipped, "Change signal lagged");
                        ServerEvent::ComputersUpdated
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            match event.to_json() {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Client disconnected
                    }
                }
                Err(e) => {
                    tracing::warn!(connection = %connection, error = %e, "Failed to encode event");
                }
            }
        }
    });

    let recv_gateway = Arc::clone(&gateway);
    let recv_ctx = ctx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => recv_gateway.handle_text(&recv_ctx, &text).await,
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(text) => recv_gateway.handle_text(&recv_ctx, text).await,
                    Err(_) => {
                        tracing::debug!(connection = %recv_ctx.connection, "Non-UTF-8 binary message ignored");
                    }
                },
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!(connection = %recv_ctx.connection, error = %e, "WebSocket receive error");
                    break;
                }
                // Pong is handled automatically by axum
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            }
        }
    });

    // Wait for either side to finish, then stop the other
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    gateway.disconnect(&ctx).await;
}
