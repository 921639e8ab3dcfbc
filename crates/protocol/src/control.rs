//! Control-Protokoll (WebSocket, JSON-Textframes)
//!
//! Definiert alle Steuerungsnachrichten die ueber die WebSocket-Verbindung
//! zwischen Client und Server ausgetauscht werden.
//!
//! ## Design
//! - Jede Nachricht ist ein JSON-Objekt mit Diskriminator `type`
//! - Typnamen in kebab-case, alle anderen Felder in camelCase
//! - Tagged Enums pro Richtung (`ClientMessage`, `ServerMessage`)
//! - Signaling-Payloads bleiben roh (`RawValue`) und werden unveraendert
//!   weitergereicht

use chrono::{DateTime, Utc};
use funkraum_core::types::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer `error`-Nachrichten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Protokoll
    InvalidRequest,
    // Sitzung
    NotAnnounced,
    SessionReplaced,
    // Raum
    RoomNotFound,
    WrongPassword,
    RoomFull,
    // Server
    ServerFull,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Raum-Informationen (Passwort wird nie serialisiert)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub creator_id: UserId,
    pub members: Vec<UserId>,
    pub max_members: u32,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_private: bool,
}

/// Benutzer-Informationen fuer Mitgliederlisten und Beitrittsantworten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub is_connected: bool,
    pub current_room: Option<RoomId>,
    pub mic_enabled: bool,
    pub is_speaking: bool,
}

/// Benutzer-Datensatz aus einer `announce`-Nachricht
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncedUser {
    /// Gewuenschte Identitaet (leer/fehlend = Server vergibt eine)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    /// Anzeigename
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Optionale ID einer externen Plattform (z.B. Account-ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Mikrofon-Flag des Clients (der Server startet jede Sitzung stumm)
    #[serde(default)]
    pub mic_enabled: bool,
}

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// Signaling-Umschlag (Offer/Answer/Candidate), fuer den Server opak
///
/// `payload` wird als rohes JSON gehalten, damit die weitergeleitete
/// Nachricht byte-identisch beim Empfaenger ankommt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    pub from_id: UserId,
    pub to_id: UserId,
    pub room_id: RoomId,
    pub payload: Box<RawValue>,
}

impl SignalEnvelope {
    /// Baut einen Umschlag aus einem beliebigen serialisierbaren Payload
    pub fn neu<T: Serialize>(
        from_id: UserId,
        to_id: UserId,
        room_id: RoomId,
        payload: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            from_id,
            to_id,
            room_id,
            payload: serde_json::value::to_raw_value(payload)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Alle Nachrichten die ein Client senden kann
///
/// Dekodierung eingehender Frames erfolgt ueber [`crate::wire`], das auch
/// den Alias-Diskriminator und unbekannte Typen behandelt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Announce {
        user: AnnouncedUser,
    },
    JoinRoom {
        room_id: RoomId,
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    LeaveRoom {
        room_id: RoomId,
        user_id: UserId,
    },
    CreateRoom {
        #[serde(default)]
        name: String,
        creator: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_members: Option<u32>,
        #[serde(default)]
        is_private: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    Signal(SignalEnvelope),
    MicToggled {
        user_id: UserId,
        room_id: RoomId,
        enabled: bool,
    },
    Speaking {
        user_id: UserId,
        room_id: RoomId,
        speaking: bool,
    },
    ListRooms,
    ListRoomMembers {
        room_id: RoomId,
    },
}

impl ClientMessage {
    /// Alle Diskriminator-Werte die der Server versteht
    pub const TYPEN: &'static [&'static str] = &[
        "announce",
        "join-room",
        "leave-room",
        "create-room",
        "signal",
        "mic-toggled",
        "speaking",
        "list-rooms",
        "list-room-members",
    ];

    /// Diskriminator-Wert dieser Nachricht (fuer Logging und Metriken)
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Announce { .. } => "announce",
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom { .. } => "leave-room",
            Self::CreateRoom { .. } => "create-room",
            Self::Signal(_) => "signal",
            Self::MicToggled { .. } => "mic-toggled",
            Self::Speaking { .. } => "speaking",
            Self::ListRooms => "list-rooms",
            Self::ListRoomMembers { .. } => "list-room-members",
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Alle Nachrichten die der Server senden kann
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RoomsUpdated {
        rooms: Vec<RoomInfo>,
    },
    RoomCreated {
        room: RoomInfo,
    },
    JoinedRoom {
        room: RoomInfo,
        user: UserInfo,
    },
    LeftRoom {
        room_id: RoomId,
        user_id: UserId,
    },
    RoomMembersUpdated {
        room_id: RoomId,
        members: Vec<UserInfo>,
    },
    MicToggled {
        user_id: UserId,
        room_id: RoomId,
        enabled: bool,
    },
    Speaking {
        user_id: UserId,
        room_id: RoomId,
        speaking: bool,
    },
    Signal(SignalEnvelope),
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl ServerMessage {
    /// Alle Diskriminator-Werte die ein Client verstehen muss
    pub const TYPEN: &'static [&'static str] = &[
        "rooms-updated",
        "room-created",
        "joined-room",
        "left-room",
        "room-members-updated",
        "mic-toggled",
        "speaking",
        "signal",
        "error",
    ];

    /// Erstellt eine Fehler-Nachricht
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
