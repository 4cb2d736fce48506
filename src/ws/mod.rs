pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use ulid::Ulid;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionId;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request from {}", addr.ip());

    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Every connection gets its own id; join requests are attributed to
    // it so a typing indicator can be cleared when the socket drops.
    let conn_id: ConnectionId = Ulid::new().to_string();
    tracing::info!("WebSocket connected: {} from {}", conn_id, addr.ip());

    // Catch the client up on the running session before anything else.
    for msg in state.welcome().await {
        if !send_json(&mut sender, &msg).await {
            tracing::error!("Failed to send welcome messages");
            return;
        }
    }

    let mut broadcast_rx = state.broadcast.subscribe();

    'conn: loop {
        tokio::select! {
            // Fan-out from the session to every connected client
            broadcast_msg = broadcast_rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "WebSocket {} lagged, skipped {} broadcasts",
                            conn_id,
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let replies = handlers::handle_message(
                                    client_msg,
                                    &conn_id,
                                    addr.ip(),
                                    &state,
                                )
                                .await;
                                for reply in replies {
                                    if !send_json(&mut sender, &reply).await {
                                        tracing::error!("Failed to send response");
                                        break 'conn;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    message: format!("Invalid message format: {}", e),
                                };
                                let _ = send_json(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed: {}", conn_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(&conn_id).await;
    tracing::info!("WebSocket connection closed: {}", conn_id);
}

async fn send_json(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}
