//! WebSocket session handling.
//!
//! One task pair per connection: a writer draining the client's outbound
//! channel into the socket, and a reader decoding JSON requests and
//! forwarding them to the signaling actor. Malformed frames are logged
//! and skipped; the session itself ends only on a close frame, a socket
//! error, or actor shutdown.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actors::{DisconnectReason, SignalingActorHandle};
use crate::wire::ClientRequest;

/// Router exposing the signaling endpoint at `/ws`.
pub fn ws_router(handle: SignalingActorHandle) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(handle)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(handle): State<SignalingActorHandle>,
) -> impl IntoResponse {
    let client_id = Uuid::new_v4().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, handle))
}

async fn handle_socket(socket: WebSocket, client_id: String, handle: SignalingActorHandle) {
    info!(
        target: "ps.transport.ws",
        client_id = %client_id,
        "WebSocket session opened"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    if handle.connect(client_id.clone(), outbound_tx).await.is_err() {
        warn!(
            target: "ps.transport.ws",
            client_id = %client_id,
            "Signaling actor unavailable, closing socket"
        );
        return;
    }

    let writer_id = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    warn!(
                        target: "ps.transport.ws",
                        client_id = %writer_id,
                        %error,
                        "Failed to serialize outbound event, skipping"
                    );
                }
            }
        }
    });

    let reader_handle = handle.clone();
    let reader_id = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut reason = DisconnectReason::TransportError;
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientRequest>(&text) {
                        Ok(request) => {
                            if reader_handle
                                .request(reader_id.clone(), request)
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(error) => {
                            // Bad frames never end the session.
                            warn!(
                                target: "ps.transport.ws",
                                client_id = %reader_id,
                                %error,
                                "Malformed request frame, ignoring"
                            );
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    reason = DisconnectReason::ClientClosed;
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    debug!(
                        target: "ps.transport.ws",
                        client_id = %reader_id,
                        %error,
                        "WebSocket read error"
                    );
                    break;
                }
            }
        }
        reason
    });

    let reason = tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            DisconnectReason::TransportError
        }
        result = &mut recv_task => {
            send_task.abort();
            result.unwrap_or(DisconnectReason::TransportError)
        }
    };

    if handle.disconnect(client_id.clone(), reason).await.is_err() {
        debug!(
            target: "ps.transport.ws",
            client_id = %client_id,
            "Signaling actor gone before disconnect could be reported"
        );
    }

    info!(
        target: "ps.transport.ws",
        client_id = %client_id,
        reason = reason.as_str(),
        "WebSocket session ended"
    );
}
