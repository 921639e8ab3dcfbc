//! Fehlertypen fuer den Signaling-Service

use funkraum_protocol::{ErrorCode, ProtokollFehler, ServerMessage};
use thiserror::Error;

use crate::rooms::BeitrittsFehler;

/// Fehlertyp fuer den Signaling-Service
///
/// Alle Varianten sind fuer den Client bestimmt und werden als
/// `error`-Nachricht mit passendem [`ErrorCode`] gemeldet.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Ungueltiger Frame (kein JSON, Pflichtfeld fehlt, ...)
    #[error("Ungueltige Nachricht: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// Binaerframes sind im Protokoll nicht vorgesehen
    #[error("Binaerframes werden nicht unterstuetzt")]
    Binaerframe,

    /// Raumbezogene Operation vor `announce`
    #[error("Nicht angemeldet – bitte zuerst announce senden")]
    NichtAngemeldet,

    /// Beitritt abgelehnt (Raum fehlt, Passwort falsch, Raum voll)
    #[error(transparent)]
    Beitritt(#[from] BeitrittsFehler),

    /// Raum existiert nicht (bei reinen Abfragen)
    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(String),

    /// Identitaet wurde von einer neueren Verbindung uebernommen
    #[error("Sitzung wurde von einer neueren Verbindung uebernommen")]
    SitzungErsetzt,

    /// Verbindungslimit erreicht
    #[error("Server ist voll")]
    ServerVoll,
}

impl SignalingError {
    /// Maschinenlesbarer Code fuer die `error`-Nachricht
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protokoll(_) | Self::Binaerframe => ErrorCode::InvalidRequest,
            Self::NichtAngemeldet => ErrorCode::NotAnnounced,
            Self::Beitritt(BeitrittsFehler::RaumNichtGefunden(_)) | Self::RaumNichtGefunden(_) => {
                ErrorCode::RoomNotFound
            }
            Self::Beitritt(BeitrittsFehler::FalschesPasswort) => ErrorCode::WrongPassword,
            Self::Beitritt(BeitrittsFehler::RaumVoll { .. }) => ErrorCode::RoomFull,
            Self::SitzungErsetzt => ErrorCode::SessionReplaced,
            Self::ServerVoll => ErrorCode::ServerFull,
        }
    }

    /// Wandelt den Fehler in eine `error`-Nachricht fuer den Client
    pub fn als_nachricht(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}
