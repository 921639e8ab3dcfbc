//! Raum-Verwaltung – In-Memory-Tabelle aller Raeume
//!
//! Raeume entstehen beim Serverstart (feste Standard-Raeume) oder zur
//! Laufzeit per `create-room`. Sie werden nie automatisch geloescht, auch
//! nicht wenn sie leer sind.
//!
//! ## Beitrittspruefung
//! Reihenfolge ist fest: Raum existiert -> Passwort (nur privat) -> Kapazitaet.
//! Wer bereits Mitglied ist, scheitert nie an der Kapazitaet.

use chrono::{DateTime, Utc};
use funkraum_core::types::{RoomId, UserId};
use funkraum_protocol::RoomInfo;
use std::collections::HashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Kapazitaet wenn `create-room` keine angibt
pub const STANDARD_MAX_MITGLIEDER: u32 = 10;

/// Untere Grenze fuer `maxMembers`
pub const MIN_MITGLIEDER: u32 = 2;

/// Obere Grenze fuer `maxMembers`
pub const MAX_MITGLIEDER: u32 = 50;

/// Creator-ID der beim Start angelegten Raeume
pub const SYSTEM_CREATOR: &str = "system";

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Gruende warum ein Beitritt abgelehnt wird
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeitrittsFehler {
    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(RoomId),

    #[error("Falsches Passwort")]
    FalschesPasswort,

    #[error("Raum ist voll ({max} Mitglieder)")]
    RaumVoll { max: u32 },
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Ein Raum mit Mitgliederliste
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub creator_id: UserId,
    /// Mitglieder in Beitrittsreihenfolge (Reihenfolge ohne Bedeutung)
    pub mitglieder: Vec<UserId>,
    pub max_mitglieder: u32,
    pub erstellt_am: DateTime<Utc>,
    pub aktiv: bool,
    pub privat: bool,
    passwort: Option<String>,
}

impl Room {
    /// Prueft ob ein User Mitglied ist
    pub fn ist_mitglied(&self, user_id: &UserId) -> bool {
        self.mitglieder.contains(user_id)
    }

    /// Prueft ein Passwort; fehlende Passwoerter zaehlen als leer
    fn passwort_passt(&self, passwort: Option<&str>) -> bool {
        self.passwort.as_deref().unwrap_or("") == passwort.unwrap_or("")
    }

    /// Wire-Darstellung (ohne Passwort)
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            creator_id: self.creator_id.clone(),
            members: self.mitglieder.clone(),
            max_members: self.max_mitglieder,
            created_at: self.erstellt_am,
            is_active: self.aktiv,
            is_private: self.privat,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomManager
// ---------------------------------------------------------------------------

/// Tabelle aller Raeume
///
/// Wie der `PresenceManager` ohne eigene Synchronisation; lebt im
/// `SitzungsZustand` hinter der gemeinsamen Sperre.
#[derive(Debug, Default)]
pub struct RoomManager {
    raeume: HashMap<RoomId, Room>,
    /// Anlage-Reihenfolge fuer stabile Raumlisten
    reihenfolge: Vec<RoomId>,
}

impl RoomManager {
    /// Erstellt eine leere Raumtabelle
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt einen festen Raum mit vorgegebener ID an (Serverstart)
    ///
    /// Existiert die ID bereits, bleibt der vorhandene Raum unveraendert.
    pub fn standard_raum_anlegen(&mut self, id: RoomId, name: &str, max_mitglieder: u32) {
        if self.raeume.contains_key(&id) {
            return;
        }
        let raum = Room {
            id: id.clone(),
            name: name.to_string(),
            creator_id: UserId::from(SYSTEM_CREATOR),
            mitglieder: Vec::new(),
            max_mitglieder: max_mitglieder_begrenzen(Some(max_mitglieder)),
            erstellt_am: Utc::now(),
            aktiv: true,
            privat: false,
            passwort: None,
        };
        self.einfuegen(raum);
    }

    /// Erstellt einen neuen Raum mit frischer ID; der Ersteller ist erstes Mitglied
    ///
    /// Schlaegt nie fehl. Leere Namen werden durch `Raum <Kurz-ID>` ersetzt,
    /// `max_mitglieder` wird auf 2..=50 begrenzt.
    pub fn raum_erstellen(
        &mut self,
        name: &str,
        creator_id: UserId,
        max_mitglieder: Option<u32>,
        privat: bool,
        passwort: Option<String>,
    ) -> &Room {
        let id = RoomId::neu_zufaellig();
        let name = match name.trim() {
            "" => format!("Raum {}", id.kurz()),
            n => n.to_string(),
        };
        let raum = Room {
            id: id.clone(),
            name,
            creator_id: creator_id.clone(),
            mitglieder: vec![creator_id],
            max_mitglieder: max_mitglieder_begrenzen(max_mitglieder),
            erstellt_am: Utc::now(),
            aktiv: true,
            privat,
            passwort: if privat { passwort } else { None },
        };
        self.einfuegen(raum)
    }

    fn einfuegen(&mut self, raum: Room) -> &Room {
        let id = raum.id.clone();
        tracing::info!(room_id = %id, name = %raum.name, max = raum.max_mitglieder, "Raum angelegt");
        self.reihenfolge.push(id.clone());
        &*self.raeume.entry(id).or_insert(raum)
    }

    /// Fuegt einen User einem Raum hinzu
    ///
    /// Pruefreihenfolge: Existenz -> Passwort (nur bei privaten Raeumen) ->
    /// Kapazitaet. Bereits vorhandene Mitglieder werden nicht doppelt eingetragen.
    pub fn beitreten(
        &mut self,
        room_id: &RoomId,
        user_id: &UserId,
        passwort: Option<&str>,
    ) -> Result<&Room, BeitrittsFehler> {
        let raum = self
            .raeume
            .get_mut(room_id)
            .ok_or_else(|| BeitrittsFehler::RaumNichtGefunden(room_id.clone()))?;

        if raum.privat && !raum.passwort_passt(passwort) {
            return Err(BeitrittsFehler::FalschesPasswort);
        }

        if !raum.ist_mitglied(user_id) {
            if raum.mitglieder.len() >= raum.max_mitglieder as usize {
                return Err(BeitrittsFehler::RaumVoll {
                    max: raum.max_mitglieder,
                });
            }
            raum.mitglieder.push(user_id.clone());
        }

        Ok(&*raum)
    }

    /// Entfernt einen User aus einem Raum
    ///
    /// Idempotent: gibt `true` nur zurueck wenn der User tatsaechlich Mitglied war.
    /// Der Raum bleibt auch leer bestehen.
    pub fn verlassen(&mut self, room_id: &RoomId, user_id: &UserId) -> bool {
        let Some(raum) = self.raeume.get_mut(room_id) else {
            return false;
        };
        let vorher = raum.mitglieder.len();
        raum.mitglieder.retain(|id| id != user_id);
        raum.mitglieder.len() != vorher
    }

    /// Gibt einen Raum zurueck
    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.raeume.get(room_id)
    }

    /// Mitglieder eines Raums (leer wenn unbekannt)
    pub fn mitglieder(&self, room_id: &RoomId) -> Vec<UserId> {
        self.raeume
            .get(room_id)
            .map(|r| r.mitglieder.clone())
            .unwrap_or_default()
    }

    /// Alle Raeume in Anlage-Reihenfolge
    pub fn auflisten(&self) -> Vec<RoomInfo> {
        self.reihenfolge
            .iter()
            .filter_map(|id| self.raeume.get(id))
            .map(Room::info)
            .collect()
    }

    /// Anzahl der Raeume
    pub fn anzahl(&self) -> usize {
        self.raeume.len()
    }
}

/// Begrenzt eine gewuenschte Kapazitaet auf den gueltigen Bereich
pub fn max_mitglieder_begrenzen(wunsch: Option<u32>) -> u32 {
    wunsch
        .unwrap_or(STANDARD_MAX_MITGLIEDER)
        .clamp(MIN_MITGLIEDER, MAX_MITGLIEDER)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
