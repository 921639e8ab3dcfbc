//! Message-Dispatcher – Routet ClientMessages an die richtigen Handler
//!
//! Der Dispatcher empfaengt Textframes einer Verbindung, dekodiert sie und
//! ruft den passenden Handler auf. Antworten und Broadcasts laufen immer
//! ueber Send-Queues, nie direkt auf einen Socket.
//!
//! ## Zustandspruefung
//! - `announce` und `list-rooms` sind immer erlaubt
//! - Alle anderen Nachrichten erfordern eine angemeldete Identitaet,
//!   sonst `error{NOT_ANNOUNCED}`
//!
//! ## Fehlerverhalten
//! - Ungueltiger Frame -> genau eine `error{INVALID_REQUEST}`-Antwort
//! - Unbekannter Typ -> Debug-Log, keine Antwort

use funkraum_core::types::{UserId, VerbindungsId};
use funkraum_protocol::{
    wire::client_nachricht_dekodieren, ClientMessage, Dekodiert, ServerMessage,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::SignalingError;
use crate::handlers::{presence_handler, room_handler, session_handler, signal_handler};
use crate::registry::ClientSender;
use crate::server_state::SignalingState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Peer-Adresse (nur fuer Logs, fehlt bei In-Process-Verbindungen)
    pub peer_addr: Option<SocketAddr>,
    /// Eindeutiges Handle dieser Verbindung
    pub verbindung_id: VerbindungsId,
    /// Eigene Send-Queue (auch vor `announce` nutzbar)
    pub sender: ClientSender,
    /// Angemeldete Identitaet (None vor `announce`)
    pub user_id: Option<UserId>,
}

impl DispatcherContext {
    /// Erstellt den Kontext einer neuen, noch nicht angemeldeten Verbindung
    pub fn neu(sender: ClientSender, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            peer_addr,
            verbindung_id: sender.verbindung_id,
            sender,
            user_id: None,
        }
    }

    /// Antwortet nur dieser Verbindung
    pub fn antworten(&self, nachricht: ServerMessage) -> bool {
        self.sender.senden(nachricht)
    }

    /// Meldet einen Fehler an diese Verbindung
    pub fn fehler_melden(&self, fehler: &SignalingError) -> bool {
        self.antworten(fehler.als_nachricht())
    }
}

/// Zentraler Message-Dispatcher
///
/// Synchron: Handler halten die Zustands-Sperre nur kurz und reihen
/// Nachrichten nicht-blockierend ein. Die Reihenfolge pro Verbindung ist
/// damit die Empfangsreihenfolge.
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet einen eingehenden Textframe
    pub fn text_verarbeiten(&self, text: &str, ctx: &mut DispatcherContext) {
        match client_nachricht_dekodieren(text) {
            Ok(Dekodiert::Nachricht(nachricht)) => self.dispatch(nachricht, ctx),
            Ok(Dekodiert::Unbekannt(typ)) => {
                tracing::debug!(verbindung = %ctx.verbindung_id, typ = %typ, "Unbekannter Nachrichtentyp ignoriert");
                self.state
                    .metriken
                    .messages_total
                    .with_label_values(&["unknown"])
                    .inc();
            }
            Err(e) => {
                tracing::debug!(verbindung = %ctx.verbindung_id, fehler = %e, "Ungueltiger Frame");
                self.state
                    .metriken
                    .messages_total
                    .with_label_values(&["invalid"])
                    .inc();
                ctx.fehler_melden(&SignalingError::from(e));
            }
        }
    }

    /// Routet eine dekodierte Nachricht an ihren Handler
    pub fn dispatch(&self, nachricht: ClientMessage, ctx: &mut DispatcherContext) {
        self.state
            .metriken
            .messages_total
            .with_label_values(&[nachricht.typ()])
            .inc();
        tracing::trace!(verbindung = %ctx.verbindung_id, typ = nachricht.typ(), "Nachricht empfangen");

        match nachricht {
            // -------------------------------------------------------------------
            // Immer erlaubt
            // -------------------------------------------------------------------
            ClientMessage::Announce { user } => {
                session_handler::handle_announce(user, ctx, &self.state)
            }
            ClientMessage::ListRooms => room_handler::handle_list_rooms(ctx, &self.state),

            // -------------------------------------------------------------------
            // Anmeldung erforderlich
            // -------------------------------------------------------------------
            nachricht => {
                let Some(user_id) = ctx.user_id.clone() else {
                    ctx.fehler_melden(&SignalingError::NichtAngemeldet);
                    return;
                };
                self.dispatch_angemeldet(nachricht, &user_id, ctx);
            }
        }
    }

    /// Routet Nachrichten die eine Anmeldung erfordern
    ///
    /// Identitaetsfelder in der Nachricht (`userId`, `creator`, `fromId`)
    /// werden ignoriert; es zaehlt die Identitaet der Verbindung.
    fn dispatch_angemeldet(
        &self,
        nachricht: ClientMessage,
        user_id: &UserId,
        ctx: &mut DispatcherContext,
    ) {
        match nachricht {
            ClientMessage::JoinRoom {
                room_id, password, ..
            } => room_handler::handle_join_room(room_id, password, user_id, ctx, &self.state),

            ClientMessage::LeaveRoom { room_id, .. } => {
                room_handler::handle_leave_room(room_id, user_id, ctx, &self.state)
            }

            ClientMessage::CreateRoom {
                name,
                max_members,
                is_private,
                password,
                ..
            } => room_handler::handle_create_room(
                room_handler::RaumAnfrage {
                    name,
                    max_mitglieder: max_members,
                    privat: is_private,
                    passwort: password,
                },
                user_id,
                ctx,
                &self.state,
            ),

            ClientMessage::ListRoomMembers { room_id } => {
                room_handler::handle_list_room_members(room_id, ctx, &self.state)
            }

            ClientMessage::MicToggled { enabled, .. } => {
                presence_handler::handle_mic_toggled(enabled, user_id, &self.state)
            }

            ClientMessage::Speaking { speaking, .. } => {
                presence_handler::handle_speaking(speaking, user_id, &self.state)
            }

            ClientMessage::Signal(umschlag) => {
                signal_handler::handle_signal(umschlag, user_id, &self.state)
            }

            // Oben bereits behandelt
            ClientMessage::Announce { user } => {
                session_handler::handle_announce(user, ctx, &self.state)
            }
            ClientMessage::ListRooms => room_handler::handle_list_rooms(ctx, &self.state),
        }
    }

    /// Bereinigt alle Ressourcen einer Verbindung beim Trennen
    ///
    /// Idempotent: ein zweiter Aufruf hat keine Wirkung.
    pub fn client_cleanup(&self, ctx: &mut DispatcherContext) {
        session_handler::handle_disconnect(ctx, &self.state);
    }
}
