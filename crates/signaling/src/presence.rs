//! Presence-Manager – Verwaltet Online-Status und Raum-Zeiger
//!
//! Wer ist angemeldet, wie heisst er, ist das Mikrofon an, spricht er
//! gerade? Der Manager haelt den ephemeren Zustand aller angemeldeten
//! Clients. Broadcasts loest er selbst nie aus, das erledigen die Handler.
//!
//! Der Raum-Zeiger (`raum`) ist ein abgeleiteter Wert: massgeblich ist die
//! Mitgliedschaft im [`crate::rooms::RoomManager`]. Beide werden immer
//! unter derselben Sperre veraendert (siehe `SitzungsZustand`).

use funkraum_core::types::{RoomId, UserId};
use funkraum_protocol::UserInfo;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// ClientPresence
// ---------------------------------------------------------------------------

/// Presence-Info eines angemeldeten Clients
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPresence {
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub external_id: Option<String>,
    pub verbunden: bool,
    pub raum: Option<RoomId>,
    pub mikrofon: bool,
    pub spricht: bool,
}

impl ClientPresence {
    /// Neuer Datensatz direkt nach `announce`: verbunden, stumm, in keinem Raum
    pub fn neu(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            avatar: None,
            external_id: None,
            verbunden: true,
            raum: None,
            mikrofon: false,
            spricht: false,
        }
    }

    /// Wire-Darstellung fuer Mitgliederlisten
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.user_id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            external_id: self.external_id.clone(),
            is_connected: self.verbunden,
            current_room: self.raum.clone(),
            mic_enabled: self.mikrofon,
            is_speaking: self.spricht,
        }
    }
}

// ---------------------------------------------------------------------------
// PresenceManager
// ---------------------------------------------------------------------------

/// Tabelle aller angemeldeten Clients
///
/// Nicht selbst synchronisiert: lebt im `SitzungsZustand` hinter der
/// gemeinsamen Sperre. Alle Mutationen ausser `upsert` sind fuer
/// unbekannte IDs ein No-op.
#[derive(Debug, Default)]
pub struct PresenceManager {
    clients: HashMap<UserId, ClientPresence>,
}

impl PresenceManager {
    /// Erstellt einen leeren PresenceManager
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt einen Client ein oder ersetzt seinen Datensatz
    pub fn upsert(&mut self, presence: ClientPresence) {
        tracing::debug!(user_id = %presence.user_id, name = %presence.name, "Presence aktualisiert");
        self.clients.insert(presence.user_id.clone(), presence);
    }

    /// Gibt den Datensatz eines Clients zurueck
    pub fn get(&self, user_id: &UserId) -> Option<&ClientPresence> {
        self.clients.get(user_id)
    }

    /// Setzt das Mikrofon-Flag. Gibt `false` zurueck wenn der Client unbekannt ist.
    pub fn mikrofon_setzen(&mut self, user_id: &UserId, aktiv: bool) -> bool {
        match self.clients.get_mut(user_id) {
            Some(p) => {
                p.mikrofon = aktiv;
                true
            }
            None => false,
        }
    }

    /// Setzt das Sprech-Flag. Gibt `false` zurueck wenn der Client unbekannt ist.
    pub fn sprechen_setzen(&mut self, user_id: &UserId, spricht: bool) -> bool {
        match self.clients.get_mut(user_id) {
            Some(p) => {
                p.spricht = spricht;
                true
            }
            None => false,
        }
    }

    /// Setzt oder loescht den Raum-Zeiger
    pub fn raum_setzen(&mut self, user_id: &UserId, raum: Option<RoomId>) {
        if let Some(p) = self.clients.get_mut(user_id) {
            p.raum = raum;
        }
    }

    /// Aktueller Raum eines Clients
    pub fn raum_von(&self, user_id: &UserId) -> Option<RoomId> {
        self.clients.get(user_id).and_then(|p| p.raum.clone())
    }

    /// Entfernt einen Client (Verbindung getrennt)
    pub fn entfernen(&mut self, user_id: &UserId) -> Option<ClientPresence> {
        let entfernt = self.clients.remove(user_id);
        if entfernt.is_some() {
            tracing::debug!(user_id = %user_id, "Presence entfernt");
        }
        entfernt
    }

    /// Sucht einen angemeldeten Client anhand seiner externen Plattform-ID
    pub fn nach_external_id(&self, external_id: &str) -> Option<UserId> {
        self.clients
            .values()
            .find(|p| p.external_id.as_deref() == Some(external_id))
            .map(|p| p.user_id.clone())
    }

    /// Loest eine Liste von IDs in Wire-Datensaetze auf (unbekannte IDs fallen weg)
    pub fn infos(&self, user_ids: &[UserId]) -> Vec<UserInfo> {
        user_ids
            .iter()
            .filter_map(|id| self.clients.get(id))
            .map(ClientPresence::info)
            .collect()
    }

    /// Anzahl angemeldeter Clients
    pub fn anzahl(&self) -> usize {
        self.clients.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::from(s)
    }

    #[test]
    fn upsert_und_abfragen() {
        let mut pm = PresenceManager::neu();
        pm.upsert(ClientPresence::neu(uid("alice"), "Alice"));

        let p = pm.get(&uid("alice")).expect("muss vorhanden sein");
        assert_eq!(p.name, "Alice");
        assert!(p.verbunden);
        assert!(!p.mikrofon);
        assert_eq!(pm.anzahl(), 1);
    }

    #[test]
    fn upsert_ersetzt_datensatz() {
        let mut pm = PresenceManager::neu();
        pm.upsert(ClientPresence::neu(uid("alice"), "Alice"));
        pm.upsert(ClientPresence::neu(uid("alice"), "Alice B."));
        assert_eq!(pm.get(&uid("alice")).unwrap().name, "Alice B.");
        assert_eq!(pm.anzahl(), 1);
    }

    #[test]
    fn mutationen_fuer_unbekannte_ids_sind_noop() {
        let mut pm = PresenceManager::neu();
        assert!(!pm.mikrofon_setzen(&uid("geist"), true));
        assert!(!pm.sprechen_setzen(&uid("geist"), true));
        pm.raum_setzen(&uid("geist"), Some(RoomId::from("lobby")));
        assert!(pm.entfernen(&uid("geist")).is_none());
        assert_eq!(pm.anzahl(), 0);
    }

    #[test]
    fn flags_setzen() {
        let mut pm = PresenceManager::neu();
        pm.upsert(ClientPresence::neu(uid("bob"), "Bob"));
        assert!(pm.mikrofon_setzen(&uid("bob"), true));
        assert!(pm.sprechen_setzen(&uid("bob"), true));

        let info = pm.get(&uid("bob")).unwrap().info();
        assert!(info.mic_enabled);
        assert!(info.is_speaking);
    }

    #[test]
    fn raum_zeiger_setzen_und_loeschen() {
        let mut pm = PresenceManager::neu();
        pm.upsert(ClientPresence::neu(uid("bob"), "Bob"));
        pm.raum_setzen(&uid("bob"), Some(RoomId::from("general")));
        assert_eq!(pm.raum_von(&uid("bob")), Some(RoomId::from("general")));
        pm.raum_setzen(&uid("bob"), None);
        assert_eq!(pm.raum_von(&uid("bob")), None);
    }

    #[test]
    fn suche_nach_external_id() {
        let mut pm = PresenceManager::neu();
        let mut p = ClientPresence::neu(uid("u-1"), "Carol");
        p.external_id = Some("plattform:42".into());
        pm.upsert(p);

        assert_eq!(pm.nach_external_id("plattform:42"), Some(uid("u-1")));
        assert_eq!(pm.nach_external_id("plattform:43"), None);
    }

    #[test]
    fn infos_ueberspringen_unbekannte() {
        let mut pm = PresenceManager::neu();
        pm.upsert(ClientPresence::neu(uid("a"), "A"));
        pm.upsert(ClientPresence::neu(uid("b"), "B"));

        let infos = pm.infos(&[uid("b"), uid("x"), uid("a")]);
        let ids: Vec<_> = infos.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
