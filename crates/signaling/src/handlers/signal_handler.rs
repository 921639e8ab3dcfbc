//! Signal-Handler – Weiterleitung von Offer/Answer/Candidate
//!
//! Der Payload ist fuer den Server opak und wird byte-identisch
//! weitergereicht. Nur `fromId` wird auf die Identitaet der Verbindung
//! gesetzt. Ist der Empfaenger nicht erreichbar, wird die Nachricht still
//! verworfen (keine Fehlerantwort an den Absender).

use funkraum_core::types::UserId;
use funkraum_protocol::{ServerMessage, SignalEnvelope};

use crate::server_state::SignalingState;

/// Verarbeitet `signal`
pub fn handle_signal(umschlag: SignalEnvelope, user_id: &UserId, state: &SignalingState) {
    let umschlag = SignalEnvelope {
        from_id: user_id.clone(),
        ..umschlag
    };
    let to_id = umschlag.to_id.clone();
    let room_id = umschlag.room_id.clone();

    if state
        .registry
        .an_user_senden(&to_id, ServerMessage::Signal(umschlag))
    {
        state.metriken.signals_relayed_total.inc();
        tracing::trace!(from = %user_id, to = %to_id, room_id = %room_id, "Signal weitergeleitet");
    } else {
        state.metriken.signals_dropped_total.inc();
        tracing::debug!(from = %user_id, to = %to_id, room_id = %room_id, "Signal verworfen: Empfaenger nicht erreichbar");
    }
}
