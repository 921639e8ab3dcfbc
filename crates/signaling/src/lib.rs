//! funkraum-signaling – WebSocket-Signaling und Raumverwaltung
//!
//! Dieser Crate implementiert den Signaling-Server fuer Funkraum. Er
//! verwaltet WebSocket-Verbindungen, Presence und Raeume und leitet
//! Verbindungsaufbau-Nachrichten (Offer/Answer/Candidate) opak zwischen
//! genau zwei Peers weiter. Medien fliessen danach direkt Peer-zu-Peer.
//!
//! ## Architektur
//!
//! ```text
//! axum Router (GET /ws)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, Heartbeat, Drop-Cleanup)
//!     |  Unangemeldet -> Angemeldet -> ImRaum -> Getrennt
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- SessionHandler  (Announce, Disconnect, Verdraengung)
//!     +-- RoomHandler     (Join, Leave, Create, List)
//!     +-- PresenceHandler (Mikrofon, Sprechen)
//!     +-- SignalHandler   (Relay an genau einen Empfaenger)
//!
//! SitzungsZustand   – PresenceManager + RoomManager hinter einer Sperre
//! ConnectionRegistry – UserId -> Send-Queue der Verbindung
//! ```

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use dispatcher::{DispatcherContext, MessageDispatcher};
pub use error::SignalingError;
pub use presence::PresenceManager;
pub use registry::{Ausgehend, ClientSender, ConnectionRegistry};
pub use rooms::{BeitrittsFehler, RoomManager};
pub use server_state::{SignalingConfig, SignalingState};
pub use ws::signaling_router;
