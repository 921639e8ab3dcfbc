//! Raum-Handler – Join, Leave, Create, List
//!
//! Alle Handler sperren den `SitzungsZustand` genau einmal und reihen ihre
//! Antworten und Broadcasts innerhalb dieser Sperre ein. Mitgliederlisten
//! werden immer aus der aktuellen Raumtabelle berechnet.

use funkraum_core::types::{RoomId, UserId};
use funkraum_protocol::ServerMessage;

use crate::dispatcher::DispatcherContext;
use crate::error::SignalingError;
use crate::registry::ConnectionRegistry;
use crate::server_state::{SignalingState, SitzungsZustand};

/// Felder einer `create-room`-Anfrage
#[derive(Debug, Clone, Default)]
pub struct RaumAnfrage {
    pub name: String,
    pub max_mitglieder: Option<u32>,
    pub privat: bool,
    pub passwort: Option<String>,
}

// ---------------------------------------------------------------------------
// Gemeinsame Bausteine (auch fuer Session- und Presence-Handler)
// ---------------------------------------------------------------------------

/// Sendet `room-members-updated` mit der aktuellen Mitgliederliste an alle Mitglieder
pub(crate) fn mitglieder_senden(
    zustand: &SitzungsZustand,
    registry: &ConnectionRegistry,
    room_id: &RoomId,
) -> usize {
    let mitglieder = zustand.raeume.mitglieder(room_id);
    let nachricht = ServerMessage::RoomMembersUpdated {
        room_id: room_id.clone(),
        members: zustand.presence.infos(&mitglieder),
    };
    registry.an_mehrere_senden(&mitglieder, &nachricht)
}

/// Entfernt einen User aus einem Raum und benachrichtigt die verbleibenden Mitglieder
///
/// Reihenfolge: `left-room`, danach `room-members-updated`. Gibt `true`
/// zurueck wenn der User Mitglied war; sonst passiert nichts.
pub(crate) fn raum_verlassen_intern(
    zustand: &mut SitzungsZustand,
    registry: &ConnectionRegistry,
    user_id: &UserId,
    room_id: &RoomId,
) -> bool {
    if zustand.presence.raum_von(user_id).as_ref() == Some(room_id) {
        zustand.presence.raum_setzen(user_id, None);
    }

    if !zustand.raeume.verlassen(room_id, user_id) {
        return false;
    }

    tracing::info!(user_id = %user_id, room_id = %room_id, "Raum verlassen");

    let verbleibend = zustand.raeume.mitglieder(room_id);
    let verlassen = ServerMessage::LeftRoom {
        room_id: room_id.clone(),
        user_id: user_id.clone(),
    };
    registry.an_mehrere_senden(&verbleibend, &verlassen);
    mitglieder_senden(zustand, registry, room_id);
    true
}

/// Verlaesst den aktuellen Raum eines Users (falls vorhanden)
pub(crate) fn aktuellen_raum_verlassen(
    zustand: &mut SitzungsZustand,
    registry: &ConnectionRegistry,
    user_id: &UserId,
) -> Option<RoomId> {
    let raum = zustand.presence.raum_von(user_id)?;
    raum_verlassen_intern(zustand, registry, user_id, &raum);
    Some(raum)
}

/// Baut `joined-room` fuer einen User, der bereits Mitglied ist
fn beitritt_bestaetigen(
    zustand: &SitzungsZustand,
    room_id: &RoomId,
    user_id: &UserId,
) -> Option<ServerMessage> {
    let room = zustand.raeume.get(room_id)?.info();
    let user = zustand.presence.get(user_id)?.info();
    Some(ServerMessage::JoinedRoom { room, user })
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Verarbeitet `list-rooms` (auch vor `announce` erlaubt)
pub fn handle_list_rooms(ctx: &DispatcherContext, state: &SignalingState) {
    let rooms = state.sitzungen.lock().raeume.auflisten();
    ctx.antworten(ServerMessage::RoomsUpdated { rooms });
}

/// Verarbeitet `list-room-members`
pub fn handle_list_room_members(room_id: RoomId, ctx: &DispatcherContext, state: &SignalingState) {
    let zustand = state.sitzungen.lock();
    if zustand.raeume.get(&room_id).is_none() {
        ctx.fehler_melden(&SignalingError::RaumNichtGefunden(room_id.to_string()));
        return;
    }
    let mitglieder = zustand.raeume.mitglieder(&room_id);
    ctx.antworten(ServerMessage::RoomMembersUpdated {
        members: zustand.presence.infos(&mitglieder),
        room_id,
    });
}

/// Verarbeitet `join-room`
///
/// Der neue Raum wird zuerst geprueft; erst bei Erfolg wird ein anderer
/// bisheriger Raum verlassen. Bei Ablehnung bleibt alles unveraendert.
pub fn handle_join_room(
    room_id: RoomId,
    passwort: Option<String>,
    user_id: &UserId,
    ctx: &DispatcherContext,
    state: &SignalingState,
) {
    let mut guard = state.sitzungen.lock();
    let zustand = &mut *guard;

    let bisheriger_raum = zustand.presence.raum_von(user_id);

    if let Err(e) = zustand
        .raeume
        .beitreten(&room_id, user_id, passwort.as_deref())
    {
        tracing::info!(user_id = %user_id, room_id = %room_id, grund = %e, "Beitritt abgelehnt");
        ctx.fehler_melden(&SignalingError::from(e));
        return;
    }

    if let Some(alt) = bisheriger_raum.filter(|r| r != &room_id) {
        raum_verlassen_intern(zustand, &state.registry, user_id, &alt);
    }
    zustand.presence.raum_setzen(user_id, Some(room_id.clone()));

    tracing::info!(user_id = %user_id, room_id = %room_id, "Raum beigetreten");

    match beitritt_bestaetigen(zustand, &room_id, user_id) {
        Some(bestaetigung) => {
            ctx.antworten(bestaetigung);
        }
        None => tracing::error!(user_id = %user_id, room_id = %room_id, "Beitritt ohne Presence-Datensatz"),
    }
    mitglieder_senden(zustand, &state.registry, &room_id);
}

/// Verarbeitet `leave-room`
///
/// Idempotent: der Absender bekommt `left-room` als Bestaetigung, auch wenn
/// er nicht Mitglied war.
pub fn handle_leave_room(
    room_id: RoomId,
    user_id: &UserId,
    ctx: &DispatcherContext,
    state: &SignalingState,
) {
    let mut zustand = state.sitzungen.lock();
    raum_verlassen_intern(&mut zustand, &state.registry, user_id, &room_id);
    ctx.antworten(ServerMessage::LeftRoom {
        room_id,
        user_id: user_id.clone(),
    });
}

/// Verarbeitet `create-room`
///
/// Der Ersteller verlaesst seinen bisherigen Raum und wird erstes Mitglied.
/// Alle angemeldeten Clients erhalten `room-created`.
pub fn handle_create_room(
    anfrage: RaumAnfrage,
    user_id: &UserId,
    ctx: &DispatcherContext,
    state: &SignalingState,
) {
    let mut guard = state.sitzungen.lock();
    let zustand = &mut *guard;

    aktuellen_raum_verlassen(zustand, &state.registry, user_id);

    let room_id = zustand
        .raeume
        .raum_erstellen(
            &anfrage.name,
            user_id.clone(),
            anfrage.max_mitglieder,
            anfrage.privat,
            anfrage.passwort,
        )
        .id
        .clone();
    zustand.presence.raum_setzen(user_id, Some(room_id.clone()));
    state.metriken.rooms.set(zustand.raeume.anzahl() as i64);

    if let Some(raum) = zustand.raeume.get(&room_id) {
        state
            .registry
            .an_alle_senden(&ServerMessage::RoomCreated { room: raum.info() });
    }
    if let Some(bestaetigung) = beitritt_bestaetigen(zustand, &room_id, user_id) {
        ctx.antworten(bestaetigung);
    }
    mitglieder_senden(zustand, &state.registry, &room_id);
}
