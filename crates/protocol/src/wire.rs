//! Wire-Format fuer WebSocket-Textframes
//!
//! Jeder Frame ist ein UTF-8 JSON-Objekt mit Diskriminator `type`. Der
//! Alias `тип` wird beim Empfang akzeptiert und vor dem Dekodieren auf
//! `type` normalisiert.
//!
//! ## Fehlerverhalten (fail closed)
//! - Kein JSON, kein Objekt, Diskriminator fehlt -> `ProtokollFehler`
//! - Bekannter Typ mit fehlenden/falschen Feldern -> `ProtokollFehler`
//! - Unbekannter Typ -> `Dekodiert::Unbekannt` (wird ignoriert)
//!
//! `signal`-Nachrichten werden direkt aus dem Originaltext dekodiert, damit
//! der Payload als `RawValue` byte-identisch erhalten bleibt.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::control::{ClientMessage, ServerMessage, SignalEnvelope};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Name des Diskriminator-Felds
pub const TYP_FELD: &str = "type";

/// Alternativer Name des Diskriminator-Felds (nur eingehend)
pub const TYP_ALIAS: &str = "тип";

/// Maximale Frame-Groesse (256 KB)
pub const MAX_FRAME_GROESSE: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Dekodierfehler fuer eingehende Frames
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    #[error("Ungueltiges JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Nachricht ist kein JSON-Objekt")]
    KeinObjekt,

    #[error("Diskriminator 'type' fehlt oder ist kein String")]
    TypFehlt,

    #[error("Ungueltige Felder fuer '{typ}': {quelle}")]
    UngueltigeFelder {
        typ: String,
        #[source]
        quelle: serde_json::Error,
    },

    #[error("Frame zu gross: {0} Bytes")]
    ZuGross(usize),
}

/// Ergebnis einer erfolgreichen Dekodierung
#[derive(Debug)]
pub enum Dekodiert<T> {
    /// Bekannter, vollstaendig validierter Nachrichtentyp
    Nachricht(T),
    /// Unbekannter Typ (vorwaertskompatibel ignorieren)
    Unbekannt(String),
}

// ---------------------------------------------------------------------------
// Nachrichtenrichtungen
// ---------------------------------------------------------------------------

/// Gemeinsame Eigenschaften beider Nachrichtenrichtungen
pub trait WireNachricht: DeserializeOwned + Sized {
    /// Bekannte Diskriminator-Werte
    fn bekannte_typen() -> &'static [&'static str];
    /// Verpackt einen Signal-Umschlag in die passende Variante
    fn aus_signal(umschlag: SignalEnvelope) -> Self;
}

impl WireNachricht for ClientMessage {
    fn bekannte_typen() -> &'static [&'static str] {
        ClientMessage::TYPEN
    }

    fn aus_signal(umschlag: SignalEnvelope) -> Self {
        ClientMessage::Signal(umschlag)
    }
}

impl WireNachricht for ServerMessage {
    fn bekannte_typen() -> &'static [&'static str] {
        ServerMessage::TYPEN
    }

    fn aus_signal(umschlag: SignalEnvelope) -> Self {
        ServerMessage::Signal(umschlag)
    }
}

// ---------------------------------------------------------------------------
// Dekodierung
// ---------------------------------------------------------------------------

/// Dekodiert einen eingehenden Textframe (Client -> Server)
pub fn client_nachricht_dekodieren(
    text: &str,
) -> Result<Dekodiert<ClientMessage>, ProtokollFehler> {
    dekodieren(text)
}

/// Dekodiert einen eingehenden Textframe (Server -> Client)
pub fn server_nachricht_dekodieren(
    text: &str,
) -> Result<Dekodiert<ServerMessage>, ProtokollFehler> {
    dekodieren(text)
}

/// Generische Dekodierung fuer beide Richtungen
pub fn dekodieren<T: WireNachricht>(text: &str) -> Result<Dekodiert<T>, ProtokollFehler> {
    if text.len() > MAX_FRAME_GROESSE {
        return Err(ProtokollFehler::ZuGross(text.len()));
    }

    let wert: Value = serde_json::from_str(text)?;
    let Value::Object(mut objekt) = wert else {
        return Err(ProtokollFehler::KeinObjekt);
    };

    let typ = typ_normalisieren(&mut objekt)?;

    if !T::bekannte_typen().contains(&typ.as_str()) {
        return Ok(Dekodiert::Unbekannt(typ));
    }

    let ungueltig = |quelle| ProtokollFehler::UngueltigeFelder {
        typ: typ.clone(),
        quelle,
    };

    if typ == "signal" {
        let umschlag: SignalEnvelope = serde_json::from_str(text).map_err(ungueltig)?;
        return Ok(Dekodiert::Nachricht(T::aus_signal(umschlag)));
    }

    let nachricht = serde_json::from_value(Value::Object(objekt)).map_err(ungueltig)?;
    Ok(Dekodiert::Nachricht(nachricht))
}

/// Liest den Diskriminator und schreibt einen `тип`-Alias auf `type` um
fn typ_normalisieren(objekt: &mut Map<String, Value>) -> Result<String, ProtokollFehler> {
    if !objekt.contains_key(TYP_FELD) {
        if let Some(alias) = objekt.remove(TYP_ALIAS) {
            objekt.insert(TYP_FELD.to_string(), alias);
        }
    }

    match objekt.get(TYP_FELD) {
        Some(Value::String(typ)) => Ok(typ.clone()),
        _ => Err(ProtokollFehler::TypFehlt),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
