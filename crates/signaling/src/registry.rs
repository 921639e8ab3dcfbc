//! Connection-Registry – Welche Verbindung gehoert zu welchem User?
//!
//! Die Registry verwaltet die Send-Queues aller angemeldeten Verbindungen
//! und stellt Methoden bereit, um Nachrichten gezielt oder an viele zu
//! senden. Senden blockiert nie: jede Verbindung hat eine eigene,
//! begrenzte Queue, die von ihrem Verbindungs-Task geleert wird.
//!
//! ## Besitz
//! Ein Eintrag gehoert genau einer Verbindung (`VerbindungsId`). Abmelden
//! entfernt nur den eigenen Eintrag, nie den einer neueren Verbindung, die
//! dieselbe Identitaet uebernommen hat.

use dashmap::DashMap;
use funkraum_core::types::{UserId, VerbindungsId};
use funkraum_protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// Ausgehende Eintraege
// ---------------------------------------------------------------------------

/// Eintrag in der Send-Queue einer Verbindung
#[derive(Debug, Clone)]
pub enum Ausgehend {
    /// Nachricht als Textframe senden
    Nachricht(ServerMessage),
    /// Close-Frame senden und Verbindung beenden
    Trennen,
}

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub verbindung_id: VerbindungsId,
    tx: mpsc::Sender<Ausgehend>,
}

impl ClientSender {
    /// Erstellt Handle und Empfangsseite der Send-Queue
    pub fn neu(verbindung_id: VerbindungsId) -> (Self, mpsc::Receiver<Ausgehend>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        (Self { verbindung_id, tx }, rx)
    }

    /// Sendet eine Nachricht nicht-blockierend an die Verbindung
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: ServerMessage) -> bool {
        self.einreihen(Ausgehend::Nachricht(nachricht))
    }

    /// Fordert die Verbindung auf, sich zu schliessen
    pub fn trennen(&self) -> bool {
        self.einreihen(Ausgehend::Trennen)
    }

    fn einreihen(&self, eintrag: Ausgehend) -> bool {
        match self.tx.try_send(eintrag) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(verbindung = %self.verbindung_id, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.verbindung_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Zuordnung UserId -> Verbindung fuer alle angemeldeten Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    clients: Arc<DashMap<UserId, ClientSender>>,
}

impl ConnectionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung fuer einen User
    ///
    /// Gibt den bisherigen Eintrag zurueck, falls er einer anderen
    /// Verbindung gehoerte (diese ist damit verdraengt).
    pub fn registrieren(&self, user_id: UserId, sender: ClientSender) -> Option<ClientSender> {
        let verbindung_id = sender.verbindung_id;
        tracing::debug!(user_id = %user_id, verbindung = %verbindung_id, "Verbindung registriert");
        self.clients
            .insert(user_id, sender)
            .filter(|alt| alt.verbindung_id != verbindung_id)
    }

    /// Entfernt den Eintrag eines Users, sofern er dieser Verbindung gehoert
    ///
    /// Gibt `true` zurueck wenn ein Eintrag entfernt wurde.
    pub fn abmelden(&self, user_id: &UserId, verbindung_id: VerbindungsId) -> bool {
        let entfernt = self
            .clients
            .remove_if(user_id, |_, sender| sender.verbindung_id == verbindung_id)
            .is_some();
        if entfernt {
            tracing::debug!(user_id = %user_id, verbindung = %verbindung_id, "Verbindung abgemeldet");
        }
        entfernt
    }

    /// Sucht die Verbindung eines Users
    pub fn suchen(&self, user_id: &UserId) -> Option<ClientSender> {
        self.clients.get(user_id).map(|s| s.value().clone())
    }

    /// Prueft ob der Eintrag eines Users dieser Verbindung gehoert
    pub fn gehoert_zu(&self, user_id: &UserId, verbindung_id: VerbindungsId) -> bool {
        self.clients
            .get(user_id)
            .is_some_and(|s| s.verbindung_id == verbindung_id)
    }

    /// Sendet eine Nachricht an einen einzelnen User
    ///
    /// Gibt `true` zurueck wenn der User gefunden und die Nachricht eingereiht wurde.
    pub fn an_user_senden(&self, user_id: &UserId, nachricht: ServerMessage) -> bool {
        match self.clients.get(user_id) {
            Some(sender) => sender.senden(nachricht),
            None => false,
        }
    }

    /// Sendet eine Nachricht an mehrere User (z.B. alle Mitglieder eines Raums)
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_mehrere_senden(&self, user_ids: &[UserId], nachricht: &ServerMessage) -> usize {
        user_ids
            .iter()
            .filter(|id| self.an_user_senden(id, nachricht.clone()))
            .count()
    }

    /// Sendet eine Nachricht an alle angemeldeten Verbindungen
    pub fn an_alle_senden(&self, nachricht: &ServerMessage) -> usize {
        self.clients
            .iter()
            .filter(|entry| entry.value().senden(nachricht.clone()))
            .count()
    }

    /// Anzahl registrierter Verbindungen
    pub fn anzahl(&self) -> usize {
        self.clients.len()
    }

    /// Prueft ob ein User erreichbar ist
    pub fn ist_registriert(&self, user_id: &UserId) -> bool {
        self.clients.contains_key(user_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use funkraum_core::types::RoomId;

    fn test_nachricht() -> ServerMessage {
        ServerMessage::LeftRoom {
            room_id: RoomId::from("general"),
            user_id: UserId::from("x"),
        }
    }

    fn naechste(rx: &mut mpsc::Receiver<Ausgehend>) -> Option<ServerMessage> {
        match rx.try_recv().ok()? {
            Ausgehend::Nachricht(n) => Some(n),
            Ausgehend::Trennen => None,
        }
    }

    #[test]
    fn registrieren_und_senden() {
        let registry = ConnectionRegistry::neu();
        let uid = UserId::from("alice");
        let (sender, mut rx) = ClientSender::neu(VerbindungsId::new());

        assert!(registry.registrieren(uid.clone(), sender).is_none());
        assert!(registry.ist_registriert(&uid));
        assert!(registry.an_user_senden(&uid, test_nachricht()));
        assert!(matches!(naechste(&mut rx), Some(ServerMessage::LeftRoom { .. })));
    }

    #[test]
    fn senden_an_unbekannten_user_schlaegt_still_fehl() {
        let registry = ConnectionRegistry::neu();
        assert!(!registry.an_user_senden(&UserId::from("niemand"), test_nachricht()));
    }

    #[test]
    fn neuere_verbindung_verdraengt_aeltere() {
        let registry = ConnectionRegistry::neu();
        let uid = UserId::from("alice");
        let (alt, _rx_alt) = ClientSender::neu(VerbindungsId::new());
        let (neu, _rx_neu) = ClientSender::neu(VerbindungsId::new());
        let alt_id = alt.verbindung_id;

        registry.registrieren(uid.clone(), alt);
        let verdraengt = registry.registrieren(uid.clone(), neu.clone());
        assert_eq!(verdraengt.map(|s| s.verbindung_id), Some(alt_id));

        // Abmelden der alten Verbindung darf den neuen Eintrag nicht entfernen
        assert!(!registry.abmelden(&uid, alt_id));
        assert!(registry.gehoert_zu(&uid, neu.verbindung_id));
        assert!(registry.abmelden(&uid, neu.verbindung_id));
        assert!(!registry.ist_registriert(&uid));
    }

    #[test]
    fn erneutes_registrieren_derselben_verbindung_verdraengt_nicht() {
        let registry = ConnectionRegistry::neu();
        let uid = UserId::from("alice");
        let (sender, _rx) = ClientSender::neu(VerbindungsId::new());
        registry.registrieren(uid.clone(), sender.clone());
        assert!(registry.registrieren(uid, sender).is_none());
    }

    #[test]
    fn an_mehrere_und_alle_senden() {
        let registry = ConnectionRegistry::neu();
        let mut empfaenger = Vec::new();
        for name in ["a", "b", "c"] {
            let (sender, rx) = ClientSender::neu(VerbindungsId::new());
            registry.registrieren(UserId::from(name), sender);
            empfaenger.push(rx);
        }

        let ziel = [UserId::from("a"), UserId::from("c"), UserId::from("weg")];
        assert_eq!(registry.an_mehrere_senden(&ziel, &test_nachricht()), 2);
        assert!(naechste(&mut empfaenger[0]).is_some());
        assert!(naechste(&mut empfaenger[1]).is_none());
        assert!(naechste(&mut empfaenger[2]).is_some());

        assert_eq!(registry.an_alle_senden(&test_nachricht()), 3);
    }

    #[test]
    fn volle_queue_verwirft_ohne_blockieren() {
        let (sender, mut rx) = ClientSender::neu(VerbindungsId::new());
        for _ in 0..SEND_QUEUE_GROESSE {
            assert!(sender.senden(test_nachricht()));
        }
        assert!(!sender.senden(test_nachricht()));
        assert!(rx.try_recv().is_ok());
        assert!(sender.senden(test_nachricht()));
    }

    #[test]
    fn geschlossene_queue_meldet_fehler() {
        let (sender, rx) = ClientSender::neu(VerbindungsId::new());
        drop(rx);
        assert!(!sender.senden(test_nachricht()));
        assert!(!sender.trennen());
    }
}
