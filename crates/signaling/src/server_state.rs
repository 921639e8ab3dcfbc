//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Presence und Raeume liegen zusammen im `SitzungsZustand` hinter einer
//! einzigen Sperre. Jede Mutation, der daraus folgende Snapshot und das
//! Einreihen der Broadcasts geschehen in einem kritischen Abschnitt, damit
//! kein Broadcast einen Zustand zeigt, den es nie gab. Die Sperre wird nie
//! ueber ein `.await` gehalten.

use funkraum_core::types::RoomId;
use funkraum_observability::FunkraumMetrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::presence::PresenceManager;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomManager;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige WebSocket-Verbindungen
    pub max_clients: usize,
    /// Heartbeat-Intervall; ohne eingehenden Frame zwischen zwei Pings wird getrennt
    pub heartbeat_intervall: Duration,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            heartbeat_intervall: Duration::from_secs(30),
        }
    }
}

/// Presence- und Raumtabelle unter gemeinsamer Sperre
#[derive(Debug, Default)]
pub struct SitzungsZustand {
    pub presence: PresenceManager,
    pub raeume: RoomManager,
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Presence + Raeume (eine Sperre fuer beide)
    pub sitzungen: Mutex<SitzungsZustand>,
    /// Send-Queues aller angemeldeten Verbindungen
    pub registry: ConnectionRegistry,
    /// Prometheus-Metriken
    pub metriken: FunkraumMetrics,
    /// Offene WebSocket-Verbindungen (angemeldet oder nicht)
    aktive_verbindungen: AtomicUsize,
    /// Startzeitpunkt des Servers
    start_time: Instant,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: FunkraumMetrics) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            sitzungen: Mutex::new(SitzungsZustand::default()),
            registry: ConnectionRegistry::neu(),
            metriken,
            aktive_verbindungen: AtomicUsize::new(0),
            start_time: Instant::now(),
        })
    }

    /// Legt einen festen Raum an (Serverstart)
    pub fn standard_raum_anlegen(&self, id: RoomId, name: &str, max_mitglieder: u32) {
        let mut zustand = self.sitzungen.lock();
        zustand.raeume.standard_raum_anlegen(id, name, max_mitglieder);
        self.metriken.rooms.set(zustand.raeume.anzahl() as i64);
    }

    /// Reserviert einen Verbindungsplatz
    ///
    /// Gibt `None` zurueck wenn `max_clients` erreicht ist. Der Platz wird
    /// freigegeben, sobald der zurueckgegebene Guard gedroppt wird.
    pub fn verbindung_reservieren(self: &Arc<Self>) -> Option<VerbindungsPlatz> {
        let vorher = self.aktive_verbindungen.fetch_add(1, Ordering::SeqCst);
        if vorher >= self.config.max_clients {
            self.aktive_verbindungen.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        self.metriken.connected_clients.inc();
        Some(VerbindungsPlatz {
            state: Arc::clone(self),
        })
    }

    /// Anzahl offener WebSocket-Verbindungen
    pub fn aktive_verbindungen(&self) -> usize {
        self.aktive_verbindungen.load(Ordering::SeqCst)
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Belegter Verbindungsplatz; gibt sich beim Drop frei
pub struct VerbindungsPlatz {
    state: Arc<SignalingState>,
}

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.state
            .aktive_verbindungen
            .fetch_sub(1, Ordering::SeqCst);
        self.state.metriken.connected_clients.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_mit_limit(max_clients: usize) -> Arc<SignalingState> {
        let config = SignalingConfig {
            max_clients,
            ..Default::default()
        };
        SignalingState::neu(config, FunkraumMetrics::neu().unwrap())
    }

    #[test]
    fn verbindungslimit_wird_eingehalten() {
        let state = state_mit_limit(2);
        let a = state.verbindung_reservieren().expect("Platz 1");
        let _b = state.verbindung_reservieren().expect("Platz 2");
        assert!(state.verbindung_reservieren().is_none());
        assert_eq!(state.aktive_verbindungen(), 2);
        assert_eq!(state.metriken.connected_clients.get(), 2);

        drop(a);
        assert_eq!(state.aktive_verbindungen(), 1);
        assert!(state.verbindung_reservieren().is_some());
    }

    #[test]
    fn standard_raum_aktualisiert_metrik() {
        let state = state_mit_limit(8);
        state.standard_raum_anlegen(RoomId::from("lobby"), "Lobby", 20);
        state.standard_raum_anlegen(RoomId::from("general"), "General", 10);
        assert_eq!(state.metriken.rooms.get(), 2);
        assert_eq!(state.sitzungen.lock().raeume.anzahl(), 2);
    }
}
