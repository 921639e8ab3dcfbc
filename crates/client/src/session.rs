//! Sitzungskoordination – verbindet Server-Ereignisse mit Peer-Verbindungen
//!
//! Der Koordinator kennt den eigenen Raum und haelt pro entferntem Mitglied
//! eine `PeerVerbindung`. Die Peer-Verbindung selbst ist eine Black Box:
//! sie erzeugt und konsumiert opake Signaling-Blobs, die der Koordinator
//! als `signal`-Nachrichten adressiert.
//!
//! ## Verhandlung
//! Von zwei Mitgliedern startet die Seite mit der lexikographisch
//! kleineren User-ID die Verhandlung, die andere antwortet nur.

use async_trait::async_trait;
use funkraum_core::types::{RoomId, UserId};
use funkraum_protocol::{ClientMessage, ErrorCode, ServerMessage, SignalEnvelope};
use serde_json::value::RawValue;
use std::collections::HashMap;

use crate::connection::SignalingClient;
use crate::error::{ClientError, ClientResult};

/// Opaker Signaling-Blob (Offer, Answer, Candidate, ...)
pub type SignalBlob = Box<RawValue>;

// ---------------------------------------------------------------------------
// Peer-Abstraktion
// ---------------------------------------------------------------------------

/// Verbindung zu genau einem entfernten Mitglied
#[async_trait]
pub trait PeerVerbindung: Send {
    /// Startet die Verhandlung (nur auf der initiierenden Seite)
    async fn verhandlung_starten(&mut self) -> ClientResult<Vec<SignalBlob>>;

    /// Verarbeitet einen Blob der Gegenseite und liefert Antwort-Blobs
    async fn signal_verarbeiten(&mut self, blob: SignalBlob) -> ClientResult<Vec<SignalBlob>>;

    /// Schliesst die Verbindung
    async fn schliessen(&mut self);
}

/// Erzeugt Peer-Verbindungen
pub trait PeerFabrik: Send {
    fn erstellen(&mut self, remote: &UserId, initiator: bool) -> Box<dyn PeerVerbindung>;
}

/// Ob die eigene Seite die Verhandlung mit `remote` startet
pub fn ist_initiator(eigene: &UserId, remote: &UserId) -> bool {
    eigene.as_str() < remote.as_str()
}

// ---------------------------------------------------------------------------
// SitzungsKoordinator
// ---------------------------------------------------------------------------

/// Verwaltet die Peer-Verbindungen im aktuellen Raum
pub struct SitzungsKoordinator<F: PeerFabrik> {
    fabrik: F,
    eigene_id: Option<UserId>,
    raum: Option<RoomId>,
    peers: HashMap<UserId, Box<dyn PeerVerbindung>>,
}

impl<F: PeerFabrik> SitzungsKoordinator<F> {
    pub fn neu(fabrik: F) -> Self {
        Self {
            fabrik,
            eigene_id: None,
            raum: None,
            peers: HashMap::new(),
        }
    }

    /// Eigene Identitaet (bekannt ab `joined-room`)
    pub fn eigene_id(&self) -> Option<&UserId> {
        self.eigene_id.as_ref()
    }

    /// Aktueller Raum
    pub fn raum(&self) -> Option<&RoomId> {
        self.raum.as_ref()
    }

    /// Entfernte Mitglieder mit offener Peer-Verbindung (sortiert)
    pub fn peers(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.peers.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Verarbeitet eine Server-Nachricht
    ///
    /// Gibt die `signal`-Nachrichten zurueck, die an den Server gehen.
    pub async fn ereignis_verarbeiten(
        &mut self,
        nachricht: ServerMessage,
    ) -> ClientResult<Vec<ClientMessage>> {
        match nachricht {
            ServerMessage::JoinedRoom { room, user } => {
                if self.raum.as_ref() != Some(&room.id) {
                    self.alle_schliessen().await;
                }
                tracing::info!(room_id = %room.id, user_id = %user.id, "Raum betreten");
                self.eigene_id = Some(user.id);
                self.raum = Some(room.id);
                Ok(Vec::new())
            }

            ServerMessage::RoomMembersUpdated { room_id, members } => {
                if self.raum.as_ref() != Some(&room_id) {
                    return Ok(Vec::new());
                }
                let mitglieder: Vec<UserId> = members.into_iter().map(|m| m.id).collect();
                self.mitglieder_abgleichen(&room_id, &mitglieder).await
            }

            ServerMessage::Signal(umschlag) => self.signal_verarbeiten(umschlag).await,

            ServerMessage::LeftRoom { room_id, user_id } => {
                if self.raum.as_ref() != Some(&room_id) {
                    return Ok(Vec::new());
                }
                if self.eigene_id.as_ref() == Some(&user_id) {
                    tracing::info!(room_id = %room_id, "Raum verlassen");
                    self.alle_schliessen().await;
                    self.raum = None;
                } else {
                    self.peer_schliessen(&user_id).await;
                }
                Ok(Vec::new())
            }

            ServerMessage::Error { code, message } => {
                tracing::warn!(code = ?code, message = %message, "Fehler vom Server");
                if code == ErrorCode::SessionReplaced {
                    self.alle_schliessen().await;
                    self.raum = None;
                }
                Ok(Vec::new())
            }

            _ => Ok(Vec::new()),
        }
    }

    /// Liest Ereignisse vom Client und sendet die erzeugten Signale zurueck
    ///
    /// Laeuft bis der Client keine Ereignisse mehr liefert.
    pub async fn betreiben(&mut self, client: &mut SignalingClient) -> ClientResult<()> {
        while let Some(nachricht) = client.naechstes_ereignis().await {
            for ausgehend in self.ereignis_verarbeiten(nachricht).await? {
                client.senden(ausgehend).await?;
            }
        }
        self.alle_schliessen().await;
        Ok(())
    }

    /// Schliesst alle Peer-Verbindungen
    pub async fn alle_schliessen(&mut self) {
        for (remote, mut peer) in self.peers.drain() {
            tracing::debug!(remote = %remote, "Peer geschlossen");
            peer.schliessen().await;
        }
    }

    async fn peer_schliessen(&mut self, remote: &UserId) {
        if let Some(mut peer) = self.peers.remove(remote) {
            tracing::debug!(remote = %remote, "Peer geschlossen");
            peer.schliessen().await;
        }
    }

    async fn mitglieder_abgleichen(
        &mut self,
        room_id: &RoomId,
        mitglieder: &[UserId],
    ) -> ClientResult<Vec<ClientMessage>> {
        let Some(ich) = self.eigene_id.clone() else {
            return Ok(Vec::new());
        };

        let weg: Vec<UserId> = self
            .peers
            .keys()
            .filter(|id| !mitglieder.contains(id))
            .cloned()
            .collect();
        for remote in weg {
            self.peer_schliessen(&remote).await;
        }

        let mut ausgehend = Vec::new();
        for remote in mitglieder {
            if *remote == ich || self.peers.contains_key(remote) {
                continue;
            }
            let initiator = ist_initiator(&ich, remote);
            let mut peer = self.fabrik.erstellen(remote, initiator);
            tracing::debug!(remote = %remote, initiator, "Peer erstellt");

            if initiator {
                match peer.verhandlung_starten().await {
                    Ok(blobs) => {
                        ausgehend.extend(signale_bauen(&ich, remote, room_id, blobs));
                    }
                    Err(e) => {
                        tracing::warn!(remote = %remote, fehler = %e, "Verhandlung fehlgeschlagen");
                        peer.schliessen().await;
                        continue;
                    }
                }
            }
            self.peers.insert(remote.clone(), peer);
        }
        Ok(ausgehend)
    }

    async fn signal_verarbeiten(
        &mut self,
        umschlag: SignalEnvelope,
    ) -> ClientResult<Vec<ClientMessage>> {
        let ich = self
            .eigene_id
            .clone()
            .unwrap_or_else(|| umschlag.to_id.clone());
        let remote = umschlag.from_id;
        if remote == ich {
            return Ok(Vec::new());
        }

        if !self.peers.contains_key(&remote) {
            tracing::debug!(remote = %remote, "Antwortender Peer erstellt");
            let peer = self.fabrik.erstellen(&remote, false);
            self.peers.insert(remote.clone(), peer);
        }
        let Some(peer) = self.peers.get_mut(&remote) else {
            return Err(ClientError::peer(format!("Peer fehlt: {remote}")));
        };

        match peer.signal_verarbeiten(umschlag.payload).await {
            Ok(blobs) => Ok(signale_bauen(&ich, &remote, &umschlag.room_id, blobs)),
            Err(e) => {
                tracing::warn!(remote = %remote, fehler = %e, "Signal konnte nicht verarbeitet werden");
                self.peer_schliessen(&remote).await;
                Ok(Vec::new())
            }
        }
    }
}

fn signale_bauen(
    ich: &UserId,
    remote: &UserId,
    room_id: &RoomId,
    blobs: Vec<SignalBlob>,
) -> Vec<ClientMessage> {
    blobs
        .into_iter()
        .map(|payload| {
            ClientMessage::Signal(SignalEnvelope {
                from_id: ich.clone(),
                to_id: remote.clone(),
                room_id: room_id.clone(),
                payload,
            })
        })
        .collect()
}
