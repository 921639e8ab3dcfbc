//! Gemeinsame Hilfen fuer die Signaling-Integration-Tests
//!
//! Fake-Verbindungen bestehen nur aus Dispatcher-Kontext und Send-Queue;
//! der Dispatcher wird direkt aufgerufen, ganz ohne Socket.

#![allow(dead_code)]

use funkraum_core::types::{RoomId, UserId, VerbindungsId};
use funkraum_observability::FunkraumMetrics;
use funkraum_protocol::{ErrorCode, ServerMessage};
use funkraum_signaling::{
    Ausgehend, ClientSender, DispatcherContext, MessageDispatcher, SignalingConfig, SignalingState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Server-Zustand + Dispatcher
pub struct Umgebung {
    pub state: Arc<SignalingState>,
    pub dispatcher: MessageDispatcher,
}

/// Eine simulierte Client-Verbindung
pub struct TestClient {
    pub ctx: DispatcherContext,
    rx: mpsc::Receiver<Ausgehend>,
    pub getrennt: bool,
}

impl Umgebung {
    /// Leerer Server ohne Raeume
    pub fn leer() -> Self {
        let state = SignalingState::neu(
            SignalingConfig::default(),
            FunkraumMetrics::neu().expect("Metriken"),
        );
        let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
        Self { state, dispatcher }
    }

    /// Server mit den Standard-Raeumen lobby/general/music
    pub fn mit_standard_raeumen() -> Self {
        let umgebung = Self::leer();
        umgebung
            .state
            .standard_raum_anlegen(RoomId::from("lobby"), "Lobby", 20);
        umgebung
            .state
            .standard_raum_anlegen(RoomId::from("general"), "General", 10);
        umgebung
            .state
            .standard_raum_anlegen(RoomId::from("music"), "Music", 10);
        umgebung
    }

    /// Oeffnet eine neue, unangemeldete Verbindung
    pub fn verbinden(&self) -> TestClient {
        let (sender, rx) = ClientSender::neu(VerbindungsId::new());
        TestClient {
            ctx: DispatcherContext::neu(sender, None),
            rx,
            getrennt: false,
        }
    }

    /// Oeffnet eine Verbindung, meldet `id` an und leert die Queue
    pub fn anmelden(&self, id: &str) -> TestClient {
        let mut client = self.verbinden();
        self.senden(
            &mut client,
            json!({"type": "announce", "user": {"id": id, "name": id.to_uppercase()}}),
        );
        client.nachrichten();
        client
    }

    /// Sendet eine JSON-Nachricht als Textframe
    pub fn senden(&self, client: &mut TestClient, nachricht: Value) {
        self.text_senden(client, &nachricht.to_string());
    }

    /// Sendet einen rohen Textframe
    pub fn text_senden(&self, client: &mut TestClient, text: &str) {
        self.dispatcher.text_verarbeiten(text, &mut client.ctx);
    }

    /// Simuliert das Ende der Verbindung
    pub fn trennen(&self, client: &mut TestClient) {
        self.dispatcher.client_cleanup(&mut client.ctx);
    }

    /// Tritt einem Raum bei und leert die Queue des Clients
    pub fn beitreten(&self, client: &mut TestClient, room_id: &str) {
        self.senden(
            client,
            json!({"type": "join-room", "roomId": room_id, "userId": "egal"}),
        );
        client.nachrichten();
    }

    /// Erstellt einen Raum und gibt seine ID zurueck
    pub fn raum_erstellen(&self, client: &mut TestClient, name: &str, max: u32) -> RoomId {
        self.senden(
            client,
            json!({"type": "create-room", "name": name, "creator": "egal", "maxMembers": max}),
        );
        client
            .nachrichten()
            .into_iter()
            .find_map(|n| match n {
                ServerMessage::JoinedRoom { room, .. } => Some(room.id),
                _ => None,
            })
            .expect("create-room muss joined-room liefern")
    }
}

impl TestClient {
    /// Holt alle bisher eingereihten Nachrichten
    pub fn nachrichten(&mut self) -> Vec<ServerMessage> {
        let mut liste = Vec::new();
        while let Ok(eintrag) = self.rx.try_recv() {
            match eintrag {
                Ausgehend::Nachricht(n) => liste.push(n),
                Ausgehend::Trennen => self.getrennt = true,
            }
        }
        liste
    }

    /// Angemeldete Identitaet
    pub fn user_id(&self) -> UserId {
        self.ctx.user_id.clone().expect("nicht angemeldet")
    }
}

/// Typnamen einer Nachrichtenfolge (fuer Reihenfolge-Assertions)
pub fn typen(nachrichten: &[ServerMessage]) -> Vec<String> {
    nachrichten
        .iter()
        .map(|n| {
            serde_json::to_value(n).expect("serialisierbar")["type"]
                .as_str()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

/// Sortierte Mitglieder-IDs aus der letzten `room-members-updated`-Nachricht
pub fn letzte_mitglieder(nachrichten: &[ServerMessage]) -> Option<Vec<String>> {
    nachrichten.iter().rev().find_map(|n| match n {
        ServerMessage::RoomMembersUpdated { members, .. } => {
            let mut ids: Vec<String> = members.iter().map(|m| m.id.to_string()).collect();
            ids.sort();
            Some(ids)
        }
        _ => None,
    })
}

/// Fehler-Code der ersten `error`-Nachricht
pub fn fehler_code(nachrichten: &[ServerMessage]) -> Option<ErrorCode> {
    nachrichten.iter().find_map(|n| match n {
        ServerMessage::Error { code, .. } => Some(*code),
        _ => None,
    })
}

/// Mitglieder eines Raums laut Raumtabelle (sortiert)
pub fn mitglieder_im_store(umgebung: &Umgebung, room_id: &RoomId) -> Vec<String> {
    let mut ids: Vec<String> = umgebung
        .state
        .sitzungen
        .lock()
        .raeume
        .mitglieder(room_id)
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    ids.sort();
    ids
}
