//! WebSocket-Endpunkt (`GET /ws`)
//!
//! Nimmt Upgrade-Anfragen an, prueft das Verbindungslimit und startet pro
//! Verbindung eine `ClientConnection`. Ist `max_clients` erreicht, wird
//! das Upgrade mit HTTP 503 abgelehnt.

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::error::SignalingError;
use crate::server_state::SignalingState;

/// Pfad des WebSocket-Endpunkts
pub const WS_PFAD: &str = "/ws";

#[derive(Clone)]
struct WsState {
    state: Arc<SignalingState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Axum-Router fuer den WebSocket-Endpunkt
///
/// `shutdown_rx` schliesst beim Wechsel auf `true` alle offenen Verbindungen.
pub fn signaling_router(state: Arc<SignalingState>, shutdown_rx: watch::Receiver<bool>) -> Router {
    Router::new()
        .route(WS_PFAD, get(ws_handler))
        .with_state(WsState { state, shutdown_rx })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ws_state): State<WsState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);

    let Some(platz) = ws_state.state.verbindung_reservieren() else {
        tracing::warn!(
            peer = ?peer,
            max = ws_state.state.config.max_clients,
            "Verbindungslimit erreicht – Upgrade abgelehnt"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            SignalingError::ServerVoll.to_string(),
        )
            .into_response();
    };

    let WsState { state, shutdown_rx } = ws_state;
    ws.on_upgrade(move |socket| async move {
        let _platz = platz;
        ClientConnection::neu(state, peer)
            .verarbeiten(socket, shutdown_rx)
            .await;
    })
}
