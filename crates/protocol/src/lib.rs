//! funkraum-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, Enums und Strukturen
//! die zwischen Client und Server ueber die WebSocket-Verbindung
//! ausgetauscht werden.

pub mod control;
pub mod wire;

pub use control::{
    AnnouncedUser, ClientMessage, ErrorCode, RoomInfo, ServerMessage, SignalEnvelope, UserInfo,
};
pub use wire::{Dekodiert, ProtokollFehler};
