//! WebSocket connection state machine.
//!
//! Runs the read/write loop for a single admitted session: drains the
//! hub's outbound queue onto the wire and dispatches incoming client
//! commands (join/leave/pong) back into the hub.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::hub::{ConnectionId, ConnectionMeta, RealtimeHub};
use super::messages::ClientMessage;
use crate::domain::UserId;

/// Runs the read/write loop for a single WebSocket session.
///
/// The session is registered with the hub on entry and always
/// unregistered on exit, whatever ends the loop: a client close frame, a
/// transport error, or the hub pruning the session's queue.
pub async fn run_connection(
    socket: WebSocket,
    hub: Arc<RealtimeHub>,
    user_id: UserId,
    meta: ConnectionMeta,
) {
    let (conn_id, mut outbound) = hub.register(user_id, meta).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Queued event from the hub
            queued = outbound.recv() => {
                let Some(msg) = queued else {
                    break; // hub dropped this session
                };
                let Ok(json) = serde_json::to_string(&msg) else {
                    continue;
                };
                if ws_tx.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
            // Incoming frame from the client
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        dispatch(&text, &hub, conn_id, user_id).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    hub.unregister(conn_id).await;
    tracing::debug!(%user_id, socket_id = %conn_id, "ws connection closed");
}

/// Handles one text frame from the client. Malformed frames are ignored;
/// the wire protocol has no error replies for client commands.
async fn dispatch(text: &str, hub: &RealtimeHub, conn_id: ConnectionId, user_id: UserId) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::JoinAuction { auction_id }) => {
            hub.join(auction_id, user_id).await;
            tracing::debug!(%user_id, %auction_id, "joined auction room");
        }
        Ok(ClientMessage::LeaveAuction { auction_id }) => {
            hub.leave(auction_id, user_id).await;
        }
        Ok(ClientMessage::Pong) => {
            hub.record_pong(conn_id).await;
        }
        Err(_) => {
            tracing::debug!(socket_id = %conn_id, "ignoring malformed ws frame");
        }
    }
}
