//! Session-Handler – Announce und Disconnect
//!
//! ## Identitaet
//! 1. `user.id`, falls gesetzt und nicht leer
//! 2. sonst die ID eines angemeldeten Users mit gleicher `externalId`
//! 3. sonst die bisherige Identitaet dieser Verbindung
//! 4. sonst eine neue UUID
//!
//! ## Verdraengung
//! Haelt bereits eine andere Verbindung diese Identitaet, verlaesst deren
//! Sitzung ihren Raum, die alte Verbindung bekommt `error{SESSION_REPLACED}`
//! und wird geschlossen. Ihr spaeteres Cleanup ist ein No-op, weil ihr der
//! Registry-Eintrag nicht mehr gehoert.

use funkraum_core::types::{UserId, VerbindungsId};
use funkraum_protocol::{AnnouncedUser, ServerMessage};

use crate::dispatcher::DispatcherContext;
use crate::error::SignalingError;
use crate::handlers::room_handler::{aktuellen_raum_verlassen, mitglieder_senden};
use crate::presence::{ClientPresence, PresenceManager};
use crate::registry::ConnectionRegistry;
use crate::server_state::{SignalingState, SitzungsZustand};

/// Bestimmt die Identitaet fuer eine `announce`-Nachricht
pub fn identitaet_bestimmen(
    presence: &PresenceManager,
    user: &AnnouncedUser,
    aktuell: Option<&UserId>,
) -> UserId {
    if let Some(id) = user.id.as_ref().filter(|id| !id.as_str().trim().is_empty()) {
        return id.clone();
    }
    if let Some(id) = user
        .external_id
        .as_deref()
        .filter(|ext| !ext.is_empty())
        .and_then(|ext| presence.nach_external_id(ext))
    {
        return id;
    }
    aktuell.cloned().unwrap_or_else(UserId::neu_zufaellig)
}

/// Verarbeitet `announce`
pub fn handle_announce(user: AnnouncedUser, ctx: &mut DispatcherContext, state: &SignalingState) {
    let mut guard = state.sitzungen.lock();
    let zustand = &mut *guard;

    // Bereits von einer anderen Verbindung verdraengt: wie neu behandeln
    if let Some(alt) = ctx.user_id.as_ref() {
        if !state.registry.gehoert_zu(alt, ctx.verbindung_id) {
            ctx.user_id = None;
        }
    }

    let identitaet = identitaet_bestimmen(&zustand.presence, &user, ctx.user_id.as_ref());

    // Identitaetswechsel auf derselben Verbindung: alte Sitzung beenden
    if ctx.user_id.as_ref().is_some_and(|alt| alt != &identitaet) {
        if let Some(alt) = ctx.user_id.take() {
            sitzung_beenden(zustand, &state.registry, &alt, ctx.verbindung_id);
        }
    }

    let bisher = match ctx.user_id {
        Some(_) => zustand.presence.get(&identitaet).cloned(),
        None => {
            verdraengen(zustand, &state.registry, &identitaet, ctx.verbindung_id);
            None
        }
    };

    let presence = ClientPresence {
        user_id: identitaet.clone(),
        name: user.name,
        avatar: user.avatar,
        external_id: user.external_id,
        verbunden: true,
        raum: bisher.as_ref().and_then(|p| p.raum.clone()),
        mikrofon: bisher.as_ref().is_some_and(|p| p.mikrofon),
        spricht: bisher.as_ref().is_some_and(|p| p.spricht),
    };
    let raum = presence.raum.clone();
    zustand.presence.upsert(presence);
    state
        .registry
        .registrieren(identitaet.clone(), ctx.sender.clone());
    ctx.user_id = Some(identitaet.clone());

    tracing::info!(
        user_id = %identitaet,
        verbindung = %ctx.verbindung_id,
        peer = ?ctx.peer_addr,
        erneut = bisher.is_some(),
        "Client angemeldet"
    );

    ctx.antworten(ServerMessage::RoomsUpdated {
        rooms: zustand.raeume.auflisten(),
    });

    // Neuer Name/Avatar fuer die Mitglieder des gehaltenen Raums
    if let Some(raum) = raum {
        mitglieder_senden(zustand, &state.registry, &raum);
    }
}

/// Verarbeitet das Ende einer Verbindung (Close, Fehler, Timeout, Shutdown)
///
/// Idempotent: nach dem ersten Aufruf ist `ctx.user_id` leer.
pub fn handle_disconnect(ctx: &mut DispatcherContext, state: &SignalingState) {
    let Some(user_id) = ctx.user_id.take() else {
        return;
    };
    let mut zustand = state.sitzungen.lock();
    sitzung_beenden(&mut zustand, &state.registry, &user_id, ctx.verbindung_id);
}

/// Beendet die Sitzung eines Users, sofern sie dieser Verbindung gehoert
///
/// Verlaesst den aktuellen Raum (mit Broadcasts), entfernt die Presence
/// und meldet die Verbindung ab.
fn sitzung_beenden(
    zustand: &mut SitzungsZustand,
    registry: &ConnectionRegistry,
    user_id: &UserId,
    verbindung_id: VerbindungsId,
) -> bool {
    if !registry.gehoert_zu(user_id, verbindung_id) {
        tracing::debug!(user_id = %user_id, verbindung = %verbindung_id, "Sitzung bereits uebernommen – kein Cleanup");
        return false;
    }

    aktuellen_raum_verlassen(zustand, registry, user_id);
    zustand.presence.entfernen(user_id);
    registry.abmelden(user_id, verbindung_id);

    tracing::info!(user_id = %user_id, verbindung = %verbindung_id, "Sitzung beendet");
    true
}

/// Verdraengt eine andere Verbindung, die dieselbe Identitaet haelt
fn verdraengen(
    zustand: &mut SitzungsZustand,
    registry: &ConnectionRegistry,
    user_id: &UserId,
    neue_verbindung: VerbindungsId,
) {
    let Some(alt) = registry
        .suchen(user_id)
        .filter(|s| s.verbindung_id != neue_verbindung)
    else {
        return;
    };

    aktuellen_raum_verlassen(zustand, registry, user_id);
    zustand.presence.entfernen(user_id);

    alt.senden(SignalingError::SitzungErsetzt.als_nachricht());
    alt.trennen();

    tracing::info!(
        user_id = %user_id,
        alt = %alt.verbindung_id,
        neu = %neue_verbindung,
        "Sitzung von neuer Verbindung uebernommen"
    );
}
