//! funkraum-client – Client-Runtime fuer den Funkraum-Signaling-Server
//!
//! - [`SignalingClient`]: WebSocket-Verbindung mit Reconnect
//! - [`SitzungsKoordinator`]: ordnet Server-Ereignisse den Peer-Verbindungen zu
//! - [`PeerVerbindung`]: opake Peer-Verbindung (Medien liegen ausserhalb)

pub mod connection;
pub mod error;
pub mod reconnect;
pub mod session;

pub use connection::{SignalingClient, VerbindungsStatus};
pub use error::{ClientError, ClientResult};
pub use reconnect::ReconnectStrategie;
pub use session::{ist_initiator, PeerFabrik, PeerVerbindung, SignalBlob, SitzungsKoordinator};
