//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung laeuft in einem eigenen tokio-Task. Eingehende
//! Textframes gehen an den `MessageDispatcher`, ausgehende Nachrichten
//! kommen ausschliesslich aus der eigenen Send-Queue.
//!
//! ## Zustaende
//! ```text
//! Unangemeldet -> Angemeldet -> (optional) ImRaum -> Getrennt
//! ```
//!
//! ## Heartbeat
//! - Server sendet alle `heartbeat_intervall` einen WebSocket-Ping
//! - Kam seit dem letzten Ping kein einziger Frame an, wird getrennt
//!
//! ## Cleanup
//! Das Disconnect-Cleanup haengt am Drop von `VerbindungsSitzung` und
//! laeuft damit auf jedem Ausstiegspfad, auch bei Task-Abbruch.

use axum::extract::ws::{Message, WebSocket};
use funkraum_core::types::VerbindungsId;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::error::SignalingError;
use crate::registry::{Ausgehend, ClientSender};
use crate::server_state::SignalingState;

// ---------------------------------------------------------------------------
// VerbindungsSitzung
// ---------------------------------------------------------------------------

/// Kontext + Dispatcher einer Verbindung; raeumt beim Drop auf
struct VerbindungsSitzung {
    ctx: DispatcherContext,
    dispatcher: MessageDispatcher,
}

impl Drop for VerbindungsSitzung {
    fn drop(&mut self) {
        self.dispatcher.client_cleanup(&mut self.ctx);
    }
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: Option<SocketAddr>,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: Option<SocketAddr>) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, der Heartbeat ausbleibt, die Sitzung
    /// verdraengt wird oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(self, socket: WebSocket, mut shutdown_rx: watch::Receiver<bool>) {
        let verbindung_id = VerbindungsId::new();
        let peer = self.peer_addr;
        let intervall = self.state.config.heartbeat_intervall;

        tracing::info!(verbindung = %verbindung_id, peer = ?peer, "Neue Verbindung");

        let (mut ws_tx, mut ws_rx) = socket.split();
        let (sender, mut sende_rx) = ClientSender::neu(verbindung_id);

        let mut sitzung = VerbindungsSitzung {
            ctx: DispatcherContext::neu(sender, peer),
            dispatcher: MessageDispatcher::neu(Arc::clone(&self.state)),
        };

        let mut heartbeat = interval_at(Instant::now() + intervall, intervall);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut empfangen_seit_ping = true;

        loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            empfangen_seit_ping = true;
                            match nachricht {
                                Message::Text(text) => {
                                    tracing::trace!(verbindung = %verbindung_id, bytes = text.len(), "Textframe empfangen");
                                    sitzung.dispatcher.text_verarbeiten(&text, &mut sitzung.ctx);
                                }
                                Message::Binary(_) => {
                                    sitzung.ctx.fehler_melden(&SignalingError::Binaerframe);
                                }
                                Message::Ping(_) | Message::Pong(_) => {}
                                Message::Close(_) => {
                                    tracing::info!(verbindung = %verbindung_id, "Verbindung vom Client geschlossen");
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(verbindung = %verbindung_id, fehler = %e, "WebSocket-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(verbindung = %verbindung_id, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus der eigenen Send-Queue
                Some(ausgehend) = sende_rx.recv() => {
                    match ausgehend {
                        Ausgehend::Nachricht(nachricht) => {
                            let text = match nachricht.to_json() {
                                Ok(t) => t,
                                Err(e) => {
                                    tracing::error!(verbindung = %verbindung_id, fehler = %e, "Serialisierung fehlgeschlagen");
                                    continue;
                                }
                            };
                            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                                tracing::warn!(verbindung = %verbindung_id, fehler = %e, "Senden fehlgeschlagen");
                                break;
                            }
                        }
                        Ausgehend::Trennen => {
                            tracing::info!(verbindung = %verbindung_id, "Verbindung wird serverseitig geschlossen");
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }

                // Heartbeat
                _ = heartbeat.tick() => {
                    if !empfangen_seit_ping {
                        tracing::warn!(verbindung = %verbindung_id, "Heartbeat-Timeout – Verbindung wird getrennt");
                        break;
                    }
                    empfangen_seit_ping = false;
                    if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                        tracing::warn!(verbindung = %verbindung_id, fehler = %e, "Ping-Senden fehlgeschlagen");
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(verbindung = %verbindung_id, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }

        drop(sitzung);
        tracing::info!(verbindung = %verbindung_id, "Verbindungs-Task beendet");
    }
}
