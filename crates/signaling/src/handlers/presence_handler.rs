//! Presence-Handler – Mikrofon- und Sprech-Status
//!
//! Aenderungen gehen an alle Mitglieder des aktuellen Raums des Absenders.
//! Das `roomId`-Feld der Nachricht wird nicht ausgewertet. Ist der Absender
//! in keinem Raum, wird nur die Presence aktualisiert.

use funkraum_core::types::UserId;
use funkraum_protocol::ServerMessage;

use crate::server_state::SignalingState;

/// Verarbeitet `mic-toggled`
pub fn handle_mic_toggled(aktiv: bool, user_id: &UserId, state: &SignalingState) {
    let mut zustand = state.sitzungen.lock();
    if !zustand.presence.mikrofon_setzen(user_id, aktiv) {
        return;
    }
    tracing::debug!(user_id = %user_id, aktiv, "Mikrofon umgeschaltet");

    let Some(room_id) = zustand.presence.raum_von(user_id) else {
        return;
    };
    let mitglieder = zustand.raeume.mitglieder(&room_id);
    let nachricht = ServerMessage::MicToggled {
        user_id: user_id.clone(),
        room_id,
        enabled: aktiv,
    };
    state.registry.an_mehrere_senden(&mitglieder, &nachricht);
}

/// Verarbeitet `speaking`
pub fn handle_speaking(spricht: bool, user_id: &UserId, state: &SignalingState) {
    let mut zustand = state.sitzungen.lock();
    if !zustand.presence.sprechen_setzen(user_id, spricht) {
        return;
    }
    tracing::trace!(user_id = %user_id, spricht, "Sprech-Status geaendert");

    let Some(room_id) = zustand.presence.raum_von(user_id) else {
        return;
    };
    let mitglieder = zustand.raeume.mitglieder(&room_id);
    let nachricht = ServerMessage::Speaking {
        user_id: user_id.clone(),
        room_id,
        speaking: spricht,
    };
    state.registry.an_mehrere_senden(&mitglieder, &nachricht);
}
