//! Axum WebSocket upgrade handler.
//!
//! The access token is verified *before* the upgrade completes; an
//! invalid or missing token never reaches the hub.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use super::hub::ConnectionMeta;
use crate::app_state::AppState;
use crate::error::AuctionError;

/// Query parameters accepted on the WebSocket handshake.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    /// Access token; required.
    pub token: Option<String>,
    /// Optional client-chosen device identifier, kept for diagnostics.
    pub device_id: Option<String>,
}

/// `GET /ws` — Upgrade to WebSocket after verifying the access token.
///
/// # Errors
///
/// Returns [`AuctionError::Unauthorized`] when the token is missing or
/// invalid; the connection is refused before any room access.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AuctionError> {
    let token = params.token.as_deref().ok_or(AuctionError::Unauthorized)?;
    let claims = state
        .token_verifier
        .verify(token)
        .ok_or(AuctionError::Unauthorized)?;

    let meta = ConnectionMeta {
        device_id: params.device_id,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };

    let hub = Arc::clone(&state.hub);
    Ok(ws.on_upgrade(move |socket| run_connection(socket, hub, claims.user_id, meta)))
}
