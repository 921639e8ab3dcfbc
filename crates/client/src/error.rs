//! Fehlertypen der Client-Runtime

use thiserror::Error;

/// Fehler die bei der Server-Verbindung auftreten koennen
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket-Verbindung fehlgeschlagen oder abgebrochen
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Nachricht konnte nicht serialisiert werden
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),

    /// Nicht mit Server verbunden
    #[error("Nicht mit Server verbunden")]
    NichtVerbunden,

    /// Hintergrund-Task wurde beendet (Client geschlossen oder aufgegeben)
    #[error("Client wurde beendet")]
    Beendet,

    /// Fehler der Peer-Verbindung
    #[error("Peer-Verbindung fehlgeschlagen: {0}")]
    Peer(String),
}

impl ClientError {
    /// Erstellt einen Peer-Fehler
    pub fn peer(msg: impl Into<String>) -> Self {
        Self::Peer(msg.into())
    }
}

/// Result-Typ der Client-Runtime
pub type ClientResult<T> = Result<T, ClientError>;
